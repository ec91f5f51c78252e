//! # Platform-Commons Benchmarks
//!
//! Hot paths that run on every publish or provisioning call:
//!
//! | Area | Operation |
//! |------|-----------|
//! | pc-01 Topology | Name qualification |
//! | shared-bus | Filter policy evaluation at fan-out |
//! | pc-02 Messaging | Event to message attributes |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use pc_01_topology::NameQualifier;
use pc_02_messaging::event_attributes;
use shared_bus::{FilterPolicy, MessageAttribute, MessageAttributes};
use shared_types::Event;

// ============================================================================
// PC-01: Name Qualification
// ============================================================================

fn bench_name_qualification(c: &mut Criterion) {
    let mut group = c.benchmark_group("pc-01-naming");
    let names = NameQualifier::new(None, Some("staging-eu-west.example.com".into()), Some("billing".into()));

    group.bench_function("qualify_topic", |b| {
        b.iter(|| black_box(names.qualify_topic(black_box("orders"))))
    });
    group.bench_function("qualify_queue", |b| {
        b.iter(|| black_box(names.qualify_queue(black_box("orders"), black_box("invoices"))))
    });
    group.finish();
}

// ============================================================================
// SHARED-BUS: Filter Policy Evaluation
// ============================================================================

fn bench_filter_policy(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared-bus-filter");

    let policy = FilterPolicy::from_value(json!({
        "type": ["created", "updated"],
        "service": [{ "prefix": "ord" }],
        "priority": [{ "numeric": [">=", 2, "<", 10] }],
        "tx": [{ "exists": true }],
    }))
    .unwrap_or_default();

    for extra in [0usize, 10, 50] {
        let mut attributes = MessageAttributes::new();
        attributes.insert("type".into(), MessageAttribute::String("created".into()));
        attributes.insert("service".into(), MessageAttribute::String("orders".into()));
        attributes.insert("priority".into(), MessageAttribute::Number("3".into()));
        attributes.insert("tx".into(), MessageAttribute::String("tx-1".into()));
        for i in 0..extra {
            attributes.insert(format!("field{i}"), MessageAttribute::String(i.to_string()));
        }

        group.throughput(Throughput::Elements(attributes.len() as u64));
        group.bench_with_input(BenchmarkId::new("matches", attributes.len()), &attributes, |b, attrs| {
            b.iter(|| black_box(policy.matches(black_box(attrs))))
        });
    }
    group.finish();
}

// ============================================================================
// PC-02: Event Attributes
// ============================================================================

fn bench_event_attributes(c: &mut Criterion) {
    let mut group = c.benchmark_group("pc-02-attributes");
    let event = Event::builder("order", "created")
        .account("acme")
        .realm("eu")
        .service("orders")
        .username("alice")
        .data(json!({ "lines": (0..100).collect::<Vec<_>>() }))
        .field("priority", json!(3))
        .build();

    if let Ok(event) = event {
        group.bench_function("event_attributes", |b| {
            b.iter(|| black_box(event_attributes(black_box(&event))))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_name_qualification,
    bench_filter_policy,
    bench_event_attributes
);
criterion_main!(benches);
