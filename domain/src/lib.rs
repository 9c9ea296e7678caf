//! Graph database operations used by the API layer.
//!
//! `web` talks to FalkorDB only through the [`graph::GraphClient`] trait. The
//! concrete client lives in [`gateway::falkordb`]; tests swap in the recording
//! client from `graph::mock` (enabled with the `mock` feature).

pub mod count;
pub mod error;
pub mod gateway;
pub mod graph;

pub use graph::{Credentials, QueryMode, QueryResult, Role, SharedClient};
