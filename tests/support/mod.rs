#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use capscan::{CapabilityCatalog, CapabilityDescriptor, ProbeAggregator, Probe, Snapshot};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a fixture probe does once its delay elapses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Present,
    Absent,
    Fails,
    Panics,
    Hangs,
}

impl Outcome {
    pub fn expected_status(self) -> capscan::CapabilityStatus {
        match self {
            Outcome::Present => capscan::CapabilityStatus::Supported,
            Outcome::Absent | Outcome::Fails | Outcome::Panics => {
                capscan::CapabilityStatus::Unsupported
            }
            Outcome::Hangs => capscan::CapabilityStatus::Pending,
        }
    }
}

/// Probe that sleeps for `delay_ms` and then behaves as `outcome` says.
pub fn delayed_probe(delay_ms: u64, outcome: Outcome) -> Probe {
    Probe::new(move || async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        match outcome {
            Outcome::Present => Ok(true),
            Outcome::Absent => Ok(false),
            Outcome::Fails => bail!("fixture probe failed"),
            Outcome::Panics => panic!("fixture probe panicked"),
            Outcome::Hangs => {
                std::future::pending::<()>().await;
                Ok(true)
            }
        }
    })
}

pub fn fixture_catalog(specs: &[(&str, u64, Outcome)]) -> CapabilityCatalog {
    specs
        .iter()
        .map(|(id, delay_ms, outcome)| {
            CapabilityDescriptor::new(
                *id,
                format!("Fixture {id}"),
                "fixture capability",
                delayed_probe(*delay_ms, *outcome),
            )
        })
        .collect()
}

/// Record every snapshot the aggregator publishes from now on.
pub fn record(aggregator: &ProbeAggregator) -> Arc<Mutex<Vec<Snapshot>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    aggregator.subscribe(move |snapshot| {
        sink.lock().unwrap().push(snapshot.clone());
    });
    seen
}

pub fn ids(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .iter()
        .map(|entry| entry.id().as_str().to_string())
        .collect()
}

pub fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn capscan_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_capscan"))
}

pub fn snapshot_schema_path(repo_root: &Path) -> PathBuf {
    repo_root.join("schema").join("snapshot.schema.json")
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {:?}", cmd))?;
    if output.status.success() {
        Ok(output)
    } else {
        bail!(
            "command {:?} failed: status {:?}\nstdout: {}\nstderr: {}",
            cmd,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    }
}
