//! Validated view of a capability catalog keyed by id.
//!
//! Building the index is where catalog configuration defects surface: empty
//! or malformed ids, blank names, and duplicate ids all reject the catalog.
//! An empty catalog is valid; hosts render a placeholder for it.

use crate::catalog::{CapabilityCatalog, CapabilityId};
use crate::error::CatalogError;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
/// Catalog position of every capability id.
pub struct CapabilityIndex {
    by_id: BTreeMap<CapabilityId, usize>,
}

impl CapabilityIndex {
    /// Validate `catalog` and index its ids.
    pub fn build(catalog: &CapabilityCatalog) -> Result<Self, CatalogError> {
        let mut by_id = BTreeMap::new();
        for (index, descriptor) in catalog.descriptors().iter().enumerate() {
            let id = descriptor.id();
            validate_id(index, id)?;
            if descriptor.name().trim().is_empty() {
                return Err(CatalogError::EmptyName { id: id.0.clone() });
            }
            if by_id.insert(id.clone(), index).is_some() {
                return Err(CatalogError::DuplicateId { id: id.0.clone() });
            }
        }
        Ok(Self { by_id })
    }

    /// Catalog position of `id`, if it is part of the catalog.
    pub fn position(&self, id: &CapabilityId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn validate_id(index: usize, id: &CapabilityId) -> Result<(), CatalogError> {
    if id.0.trim().is_empty() {
        return Err(CatalogError::EmptyId { index });
    }

    if !id
        .0
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(CatalogError::InvalidId { id: id.0.clone() });
    }

    Ok(())
}
