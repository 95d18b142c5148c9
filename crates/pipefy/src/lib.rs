//! Pipefy GraphQL integration.
//!
//! - [`client`]: the [`GraphqlTransport`](client::GraphqlTransport) seam and
//!   its `reqwest` implementation.
//! - [`queries`]: the named operation documents sent to Pipefy.
//! - [`catalog`]: phases, fields and members of a pipe.
//! - [`bulk`]: per-card field updates and card moves, with per-item outcomes.

pub mod bulk;
pub mod catalog;
pub mod client;
pub mod error;
pub mod queries;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bulk::BulkUpdater;
pub use catalog::Catalog;
pub use client::{GraphqlResponse, GraphqlTransport, PipefyClient};
pub use error::PipefyError;
