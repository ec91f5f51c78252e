//! # Messaging Flows
//!
//! Provisioning, publishing and consuming wired together the way a service
//! does it at startup:
//!
//! 1. **Filtered delivery**: a group with a filter policy only receives the
//!    matching events, end to end through the consumer.
//! 2. **Idempotent provisioning**: re-running group creation changes nothing.
//! 3. **Multi-topic queues**: one queue fed by several topics.
//! 4. **Dead-lettering**: a message received too often moves to the DLQ.
//! 5. **Consumer resilience**: failing handlers never stop the poll loop.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use pc_01_topology::{
        BrokerProvisioner, SubscriptionGroupSpec, TopologyApi, TopologyConfig,
        MULTI_TOPIC_SENTINEL,
    };
    use pc_02_messaging::{
        handler_fn, EventPublisher, HandlerError, MessagingConfig, QueueConsumer,
    };
    use shared_bus::{Broker, BrokerOperation, FilterPolicy, InMemoryBroker, MessageAttributes};
    use shared_store::{DocumentStore, Filter, InMemoryDocumentStore};
    use shared_types::{Event, Namespace, RequestContext, TRANSACTION_HEADER};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Two services in one environment sharing a broker and a database.
    struct Platform {
        broker: Arc<InMemoryBroker>,
        store: Arc<InMemoryDocumentStore>,
        /// Provisioner of the consuming service
        billing: Arc<BrokerProvisioner>,
        /// Publisher of the producing service
        publisher: EventPublisher,
    }

    fn platform() -> Platform {
        let broker = Arc::new(InMemoryBroker::new());
        let store = Arc::new(InMemoryDocumentStore::new());
        let billing = Arc::new(BrokerProvisioner::new(
            broker.clone(),
            TopologyConfig::for_service("dev", "billing"),
        ));
        let orders = Arc::new(BrokerProvisioner::new(
            broker.clone(),
            TopologyConfig::for_service("dev", "orders"),
        ));
        let publisher = EventPublisher::new(
            orders,
            broker.clone(),
            store.clone(),
            MessagingConfig::default(),
        );
        Platform {
            broker,
            store,
            billing,
            publisher,
        }
    }

    fn fast_consumer(p: &Platform) -> QueueConsumer {
        QueueConsumer::new(
            p.billing.clone(),
            p.broker.clone(),
            MessagingConfig {
                consumer_wait_secs: 1,
                consumer_error_backoff_ms: 10,
                ..MessagingConfig::default()
            },
        )
    }

    fn order_event(event_type: &str, order_id: u32) -> Event {
        let ctx = RequestContext::new("acme", "eu", "alice").with_header(TRANSACTION_HEADER, "tx-1");
        Event::from_context(&ctx, "orders", "order", event_type)
            .data(json!({ "orderId": order_id }))
            .build()
            .unwrap()
    }

    fn created_only() -> FilterPolicy {
        FilterPolicy::from_value(json!({ "type": ["created"] })).unwrap()
    }

    // =============================================================================
    // INTEGRATION TESTS: PROVISION → PUBLISH → CONSUME
    // =============================================================================

    #[tokio::test]
    async fn test_filtered_group_delivers_only_matching_events() {
        let p = platform();
        p.billing
            .create_subscription_group(
                &SubscriptionGroupSpec::new(["orders"], "billing").with_filter(created_only()),
            )
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = handler_fn(move |event: Event| {
            let tx = tx.clone();
            async move {
                tx.send(event).ok();
                Ok::<(), HandlerError>(())
            }
        });
        let handle = fast_consumer(&p)
            .start("orders", "billing", Some(handler))
            .await
            .unwrap();

        p.publisher.publish("orders", &order_event("paid", 1)).await;
        p.publisher.publish("orders", &order_event("created", 2)).await;

        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type, "created");
        assert_eq!(event.data["orderId"], 2);
        assert_eq!(event.tx.as_deref(), Some("tx-1"));

        // The filtered-out event never reaches the queue.
        assert!(timeout(Duration::from_millis(200), rx.recv()).await.is_err());

        // Both events are in the event log regardless of subscribers.
        let ns = Namespace::new("acme", "eu");
        let logged = p.store.find(&ns, "events", &Filter::all()).await.unwrap();
        assert_eq!(logged.len(), 2);
        handle.abort();
    }

    #[tokio::test]
    async fn test_publish_to_unknown_topic_creates_it() {
        let p = platform();
        p.publisher.publish("shipments", &order_event("created", 1)).await;

        let topic = p.billing.get_topic_id("shipments").await.unwrap();
        assert!(topic.ends_with(":dev_shipments"));
    }

    #[tokio::test]
    async fn test_group_creation_is_idempotent() {
        let p = platform();
        let spec = SubscriptionGroupSpec::new(["orders"], "billing").with_filter(created_only());

        let first = p.billing.create_subscription_group(&spec).await.unwrap();
        let second = p.billing.create_subscription_group(&spec).await.unwrap();

        assert_eq!(first.queue, second.queue);
        assert_eq!(first.topic_arns, second.topic_arns);
        assert!(first.subscriptions.iter().all(|s| s.created));
        assert!(second.subscriptions.iter().all(|s| !s.created));
        assert_eq!(p.broker.subscriptions_of(&first.topic_arns[0]).len(), 1);
    }

    #[tokio::test]
    async fn test_topic_lookup_served_from_cache() {
        let p = platform();
        let arn = p.billing.create_topic("orders").await.unwrap();
        let lists = p.broker.call_count(BrokerOperation::ListTopics);

        assert_eq!(p.billing.get_topic_id("orders").await.unwrap(), arn);
        assert_eq!(p.broker.call_count(BrokerOperation::ListTopics), lists);
    }

    #[tokio::test]
    async fn test_multi_topic_queue_receives_from_every_topic() {
        let p = platform();
        let group = p
            .billing
            .create_subscription_group(&SubscriptionGroupSpec::new(["orders", "refunds"], "audit"))
            .await
            .unwrap();
        assert!(group.queue.qualified_name.contains(MULTI_TOPIC_SENTINEL));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = handler_fn(move |event: Event| {
            let tx = tx.clone();
            async move {
                tx.send(event.event_type).ok();
                Ok::<(), HandlerError>(())
            }
        });
        let handle = fast_consumer(&p)
            .start(MULTI_TOPIC_SENTINEL, "audit", Some(handler))
            .await
            .unwrap();

        p.publisher.publish("orders", &order_event("created", 1)).await;
        p.publisher.publish("refunds", &order_event("refunded", 1)).await;

        let mut received = Vec::new();
        for _ in 0..2 {
            received.push(
                timeout(Duration::from_secs(5), rx.recv())
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        received.sort();
        assert_eq!(received, vec!["created", "refunded"]);
        handle.abort();
    }

    #[tokio::test]
    async fn test_over_received_message_moves_to_dead_letter_queue() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut config = TopologyConfig::for_service("dev", "billing");
        config.dlq_max_receive_count = 1;
        let provisioner = BrokerProvisioner::new(broker.clone(), config);

        let queue = provisioner.create_queue("orders", "invoices").await.unwrap();
        broker
            .send_message(&queue.url, "poison".into(), MessageAttributes::new())
            .await
            .unwrap();

        let first = broker
            .receive_messages(&queue.url, 1, Duration::ZERO)
            .await
            .unwrap();
        broker
            .change_message_visibility(&queue.url, &first[0].receipt_handle, Duration::ZERO)
            .await
            .unwrap();
        assert!(broker
            .receive_messages(&queue.url, 1, Duration::ZERO)
            .await
            .unwrap()
            .is_empty());

        let dlq_url = broker
            .get_queue_url(&provisioner.names().dead_letter_queue_name())
            .await
            .unwrap()
            .unwrap();
        let dead = broker
            .receive_messages(&dlq_url, 1, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(dead[0].body, "poison");
    }

    #[tokio::test]
    async fn test_consumer_survives_failing_handler() {
        let p = platform();
        p.billing
            .create_subscription_group(&SubscriptionGroupSpec::new(["orders"], "billing"))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = handler_fn(move |event: Event| {
            let tx = tx.clone();
            async move {
                tx.send(event.data["orderId"].clone()).ok();
                if event.event_type == "paid" {
                    panic!("cannot handle payments");
                }
                Err::<(), HandlerError>("always failing".into())
            }
        });
        let handle = fast_consumer(&p)
            .start("orders", "billing", Some(handler))
            .await
            .unwrap();

        for (event_type, id) in [("created", 1), ("paid", 2), ("created", 3)] {
            p.publisher.publish("orders", &order_event(event_type, id)).await;
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(
                timeout(Duration::from_secs(5), rx.recv())
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        assert_eq!(seen, vec![json!(1), json!(2), json!(3)]);
        assert!(!handle.is_finished());
        assert!(handle.cycles() >= 3);
        handle.abort();
    }
}
