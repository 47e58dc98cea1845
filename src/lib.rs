//! Shared library for the capscan host capability probe.
//!
//! The crate exposes the capability catalog (descriptors plus their probes),
//! the `ProbeAggregator` that runs every probe concurrently and publishes
//! catalog-ordered snapshots, and the text/NDJSON renderers the `capscan`
//! binary prints with.

pub mod aggregator;
pub mod catalog;
pub mod error;
pub mod logging;
pub mod render;

pub use aggregator::{Listener, ProbeAggregator, Snapshot, SnapshotEntry, SubscriptionId};
pub use catalog::{
    CapabilityCatalog, CapabilityDescriptor, CapabilityId, CapabilityIndex, CapabilityInfo,
    CapabilityStatus, Probe, ProbeFuture, builtin_catalog,
};
pub use error::CatalogError;

/// Split comma- or whitespace-delimited configuration lists into tokens.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .replace(',', " ")
        .split_whitespace()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
