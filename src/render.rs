//! Plain-text and NDJSON renderings of a snapshot.
//!
//! This is the display side of the aggregator contract: it consumes a
//! finished `Snapshot`, never mutates it, prints a placeholder for an empty
//! catalog, and gives each status its own label.

use crate::aggregator::Snapshot;
use crate::catalog::{CapabilityCatalog, CapabilityStatus};
use anyhow::Result;
use std::fmt;

pub const EMPTY_PLACEHOLDER: &str = "no capabilities to probe";

/// Display label for a status.
pub fn status_label(status: CapabilityStatus) -> &'static str {
    match status {
        CapabilityStatus::Pending => "CHECKING...",
        CapabilityStatus::Supported => "SUPPORTED",
        CapabilityStatus::Unsupported => "UNSUPPORTED",
    }
}

/// Render the snapshot as an aligned table followed by a one-line summary.
pub fn render_table<W: fmt::Write>(snapshot: &Snapshot, writer: &mut W) -> fmt::Result {
    if snapshot.is_empty() {
        return writeln!(writer, "{EMPTY_PLACEHOLDER}");
    }

    let width = snapshot
        .iter()
        .map(|entry| entry.capability.name.len())
        .max()
        .unwrap_or(0);

    for entry in snapshot {
        writeln!(
            writer,
            "{:<12} {:<width$}  {}",
            status_label(entry.status),
            entry.capability.name,
            entry.capability.description,
        )?;
        if let Some(url) = &entry.capability.reference_url {
            writeln!(writer, "{:<12} {:<width$}  {}", "", "", url)?;
        }
    }

    writeln!(writer)?;
    writeln!(
        writer,
        "supported: {}  unsupported: {}  checking: {}",
        snapshot.count(CapabilityStatus::Supported),
        snapshot.count(CapabilityStatus::Unsupported),
        snapshot.pending_count()
    )
}

/// Render the catalog itself (id, name, link) without probing anything.
pub fn render_catalog<W: fmt::Write>(catalog: &CapabilityCatalog, writer: &mut W) -> fmt::Result {
    if catalog.is_empty() {
        return writeln!(writer, "{EMPTY_PLACEHOLDER}");
    }
    for descriptor in catalog.descriptors() {
        writeln!(writer, "{:<24} {}", descriptor.id(), descriptor.name())?;
        if let Some(url) = descriptor.reference_url() {
            writeln!(writer, "{:<24} {}", "", url)?;
        }
    }
    Ok(())
}

/// One compact JSON line for the snapshot.
pub fn snapshot_ndjson(snapshot: &Snapshot) -> Result<String> {
    Ok(serde_json::to_string(snapshot)?)
}
