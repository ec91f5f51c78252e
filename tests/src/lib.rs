//! # Platform-Commons Test Suite
//!
//! Cross-crate flows that no single crate can test on its own.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── topology_benchmarks.rs   # Naming and filter evaluation
//! └── src/integration/
//!     ├── messaging_flows.rs       # Provision → publish → consume
//!     └── scope_flows.rs           # Request scopes, expiry, locks
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pc-tests
//! cargo test -p pc-tests integration::scope_flows
//! cargo bench -p pc-tests
//! ```

pub mod integration;
