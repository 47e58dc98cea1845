//! Capability catalog wiring.
//!
//! A catalog is the fixed, ordered list of capabilities a session probes.
//! `CapabilityCatalog::builtin` returns the compiled-in host catalog; hosts
//! and tests can assemble their own with `CapabilityCatalog::new`.
//! `CapabilityIndex` validates a catalog and resolves ids to positions.

pub mod builtin;
pub mod identity;
pub mod index;
pub mod model;

pub use builtin::builtin_catalog;
pub use identity::{CapabilityId, CapabilityStatus};
pub use index::CapabilityIndex;
pub use model::{CapabilityCatalog, CapabilityDescriptor, CapabilityInfo, Probe, ProbeFuture};

impl CapabilityCatalog {
    /// The compiled-in host catalog.
    pub fn builtin() -> &'static CapabilityCatalog {
        builtin_catalog()
    }
}
