//! Domain layer for the OpenPipes backend.
//!
//! Pure types and logic shared by the Pipefy client, the persistence layer
//! and the HTTP API: the Pipefy field model, field selection, the per-caller
//! session context, the XLSX update template and the token vault. This crate
//! has no internal dependencies.

pub mod error;
pub mod pipe;
pub mod selection;
pub mod session;
pub mod template;
pub mod types;
pub mod vault;
