//! Utility modules: partial JSON recovery and timeouts.

pub mod partial_json;
pub mod timeout;

pub use partial_json::parse_partial;
