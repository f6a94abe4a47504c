//! HTTP API contract types
//!
//! Versioned request and response shapes for the journal API. Field names are
//! part of the wire contract; do not rename without a version bump.

pub mod journal_v1;

pub use journal_v1::*;
