//! In-memory representation of a capability catalog.
//!
//! A catalog is an ordered list of descriptors; order is display order. Each
//! descriptor splits into the serializable `CapabilityInfo` (what snapshots
//! carry) and an opaque `Probe` handle that only the aggregator invokes.

use crate::catalog::identity::CapabilityId;
use crate::error::CatalogError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by a probe invocation.
pub type ProbeFuture = Pin<Box<dyn Future<Output = Result<bool>> + Send + 'static>>;

/// Zero-argument asynchronous capability check.
///
/// Resolves `Ok(true)` when the capability is present and `Ok(false)` when it
/// is not. `Err` (or a panic) means the check could not decide.
#[derive(Clone)]
pub struct Probe(Arc<dyn Fn() -> ProbeFuture + Send + Sync>);

impl Probe {
    pub fn new<F, Fut>(check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        Self(Arc::new(move || Box::pin(check())))
    }

    /// Start one run of the check.
    pub fn run(&self) -> ProbeFuture {
        (self.0)()
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Probe(..)")
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
/// Displayable metadata for one capability.
pub struct CapabilityInfo {
    pub id: CapabilityId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub reference_url: Option<String>,
}

#[derive(Clone, Debug)]
/// Catalog entry: capability metadata paired with its probe.
pub struct CapabilityDescriptor {
    info: Arc<CapabilityInfo>,
    probe: Probe,
}

impl CapabilityDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        probe: Probe,
    ) -> Self {
        Self {
            info: Arc::new(CapabilityInfo {
                id: CapabilityId::new(id),
                name: name.into(),
                description: description.into(),
                reference_url: None,
            }),
            probe,
        }
    }

    /// Attach a documentation link. Blank urls are stored as absent.
    pub fn with_reference_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        let url = if url.trim().is_empty() {
            None
        } else {
            Some(url)
        };
        Arc::make_mut(&mut self.info).reference_url = url;
        self
    }

    pub fn id(&self) -> &CapabilityId {
        &self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn description(&self) -> &str {
        &self.info.description
    }

    pub fn reference_url(&self) -> Option<&str> {
        self.info.reference_url.as_deref()
    }

    pub fn info(&self) -> &Arc<CapabilityInfo> {
        &self.info
    }

    pub fn probe(&self) -> &Probe {
        &self.probe
    }
}

#[derive(Clone, Debug, Default)]
/// Fixed, ordered set of capabilities to probe.
pub struct CapabilityCatalog {
    descriptors: Vec<CapabilityDescriptor>,
}

impl CapabilityCatalog {
    /// Wrap descriptors without validating them; `ProbeAggregator::initialize`
    /// performs validation so malformed catalogs are rejected at startup.
    pub fn new(descriptors: Vec<CapabilityDescriptor>) -> Self {
        Self { descriptors }
    }

    /// Descriptors in display order.
    pub fn descriptors(&self) -> &[CapabilityDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, id: &CapabilityId) -> Option<&CapabilityDescriptor> {
        self.descriptors.iter().find(|descriptor| descriptor.id() == id)
    }

    /// Restrict the catalog to `ids`, keeping catalog order.
    ///
    /// Every requested id must exist; an unknown id is a configuration error
    /// rather than something to skip silently.
    pub fn select<S: AsRef<str>>(&self, ids: &[S]) -> Result<Self, CatalogError> {
        let mut wanted = BTreeSet::new();
        for raw in ids {
            let id = CapabilityId::from(raw.as_ref());
            if self.get(&id).is_none() {
                return Err(CatalogError::UnknownId { id: id.0 });
            }
            wanted.insert(id);
        }
        let descriptors = self
            .descriptors
            .iter()
            .filter(|descriptor| wanted.contains(descriptor.id()))
            .cloned()
            .collect();
        Ok(Self { descriptors })
    }
}

impl FromIterator<CapabilityDescriptor> for CapabilityCatalog {
    fn from_iter<I: IntoIterator<Item = CapabilityDescriptor>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
