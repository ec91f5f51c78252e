//! Cross-crate integration flows, all on the in-memory adapters.

pub mod messaging_flows;
pub mod scope_flows;
