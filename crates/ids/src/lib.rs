//! Entity identifier utilities.
//!
//! Every record held by the Sehati stores is keyed by an identifier of the form
//! `<prefix>-<timestamp>`, where `timestamp` is the creation time in Unix milliseconds:
//!
//! ```text
//! apt-1767225600000
//! notif-1767225600001
//! ```
//!
//! The prefix names the entity kind (`apt`, `lab`, `rx`, `order`, ...). Identifiers are not
//! verified unique by any server; uniqueness within a store instance is provided by
//! [`IdGenerator`], which never hands out the same millisecond twice.
//!
//! This crate provides:
//! - [`EntityId`], a validated identifier that guarantees the `<prefix>-<millis>` shape once
//!   constructed.
//! - [`IdGenerator`], a monotonic generator for new identifiers.

mod service;

pub use service::{EntityId, IdGenerator};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
