//! Configuration errors raised while validating a capability catalog.
//!
//! These indicate a defect in how the catalog was assembled, not a runtime
//! condition, so `ProbeAggregator::initialize` rejects the catalog outright.
//! Probe failures never show up here; the aggregator folds them into
//! `Unsupported`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("capability at position {index} has an empty id")]
    EmptyId { index: usize },

    #[error("capability id must match ^[A-Za-z0-9_.-]+$, got {id:?}")]
    InvalidId { id: String },

    #[error("capability {id} has an empty name")]
    EmptyName { id: String },

    #[error("duplicate capability id {id}")]
    DuplicateId { id: String },

    #[error("unknown capability id {id}")]
    UnknownId { id: String },
}
