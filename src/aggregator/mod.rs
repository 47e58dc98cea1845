//! Concurrent probe driver and status aggregator.
//!
//! `ProbeAggregator` owns the live status map for one catalog. `start` spawns
//! every probe as its own tokio task; as each task settles, exactly that
//! capability's status moves from `Pending` to a terminal value, the full
//! snapshot is rebuilt in catalog order, and every listener receives it.
//!
//! Probe failures (an `Err` or a panic) are absorbed here and reported as
//! `Unsupported`. They are visible only in `tracing` output, never to
//! listeners.
//!
//! Lock order is `listeners` then `state`. Neither lock is held across an
//! `.await`, and the whole update-and-deliver step for one settlement runs
//! under the `listeners` lock, so all listeners observe updates in the same
//! order. Listeners may call `current_snapshot` but must not subscribe,
//! unsubscribe, or re-initialize from inside the callback. A listener that
//! panics is logged and skipped for that update; it stays registered and the
//! remaining listeners still run.

pub mod snapshot;

pub use snapshot::{Snapshot, SnapshotEntry};

use crate::catalog::{CapabilityCatalog, CapabilityId, CapabilityIndex, CapabilityStatus, Probe};
use crate::error::CatalogError;
use anyhow::{Context, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Callback invoked with each new snapshot.
pub type Listener = Box<dyn Fn(&Snapshot) + Send + Sync + 'static>;

/// Handle returned by `subscribe`, used to remove the listener again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// How a single probe run ended.
enum Settlement {
    Resolved(bool),
    Failed(anyhow::Error),
    Panicked(String),
}

impl Settlement {
    fn status(&self) -> CapabilityStatus {
        match self {
            Settlement::Resolved(present) => CapabilityStatus::from_outcome(*present),
            Settlement::Failed(_) | Settlement::Panicked(_) => CapabilityStatus::Unsupported,
        }
    }

    fn log(&self, id: &CapabilityId) {
        match self {
            Settlement::Resolved(present) => {
                debug!(capability = %id, present, "probe settled");
            }
            Settlement::Failed(err) => {
                let error = format!("{err:#}");
                warn!(capability = %id, error = %error, "probe failed; reporting unsupported");
            }
            Settlement::Panicked(reason) => {
                warn!(capability = %id, reason = %reason, "probe panicked; reporting unsupported");
            }
        }
    }
}

/// Where a subscription's snapshots go.
enum Sink {
    Callback(Listener),
    /// Backs `updates()`; removed once the receiver is dropped.
    Channel(mpsc::UnboundedSender<Snapshot>),
}

impl Sink {
    /// Hand `snapshot` over. Returns false when the subscription is dead.
    fn deliver(&self, subscription: SubscriptionId, snapshot: &Snapshot) -> bool {
        match self {
            Sink::Callback(listener) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(snapshot)));
                if let Err(payload) = outcome {
                    let reason = panic_reason(&*payload);
                    warn!(
                        subscription = subscription.0,
                        revision = snapshot.revision(),
                        reason = %reason,
                        "listener panicked; continuing delivery"
                    );
                }
                true
            }
            Sink::Channel(tx) => {
                let open = tx.send(snapshot.clone()).is_ok();
                if !open {
                    debug!(
                        subscription = subscription.0,
                        "update receiver dropped; removing subscription"
                    );
                }
                open
            }
        }
    }
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(SubscriptionId, Sink)>,
}

impl Listeners {
    fn register(&mut self, sink: Sink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, sink));
        id
    }
}

#[derive(Default)]
struct State {
    generation: u64,
    started: bool,
    catalog: CapabilityCatalog,
    index: CapabilityIndex,
    statuses: Vec<CapabilityStatus>,
    snapshot: Snapshot,
}

impl State {
    fn entries(&self) -> Vec<SnapshotEntry> {
        self.catalog
            .descriptors()
            .iter()
            .zip(&self.statuses)
            .map(|(descriptor, status)| SnapshotEntry {
                capability: Arc::clone(descriptor.info()),
                status: *status,
            })
            .collect()
    }

    fn rebuild_snapshot(&mut self) {
        self.snapshot = Snapshot::new(self.snapshot.revision() + 1, self.entries());
    }

    fn pending(&self) -> usize {
        self.statuses
            .iter()
            .filter(|status| !status.is_terminal())
            .count()
    }
}

struct Shared {
    listeners: Mutex<Listeners>,
    state: Mutex<State>,
    pending: watch::Sender<usize>,
}

/// Drives every probe in a catalog and publishes catalog-ordered snapshots.
///
/// Cloning yields another handle to the same aggregator.
#[derive(Clone)]
pub struct ProbeAggregator {
    shared: Arc<Shared>,
}

impl Default for ProbeAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeAggregator {
    /// An aggregator with no catalog; `current_snapshot` is empty until
    /// `initialize` is called.
    pub fn new() -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                listeners: Mutex::new(Listeners::default()),
                state: Mutex::new(State::default()),
                pending,
            }),
        }
    }

    /// Build an aggregator and initialize it with `catalog` in one step.
    pub fn with_catalog(catalog: CapabilityCatalog) -> Result<Self, CatalogError> {
        let aggregator = Self::new();
        aggregator.initialize(catalog)?;
        Ok(aggregator)
    }

    /// Validate `catalog` and reset every capability to `Pending`.
    ///
    /// Returns the initial all-pending snapshot. Calling this again discards
    /// all previous results; probes still running from the earlier session
    /// settle into nothing. A rejected catalog leaves the current state
    /// untouched. Listeners stay registered but are not notified of the reset.
    pub fn initialize(&self, catalog: CapabilityCatalog) -> Result<Snapshot, CatalogError> {
        let index = CapabilityIndex::build(&catalog)?;
        let pending = catalog.len();

        let _listeners = lock(&self.shared.listeners);
        let snapshot = {
            let mut state = lock(&self.shared.state);
            let generation = state.generation + 1;
            let statuses = vec![CapabilityStatus::Pending; pending];
            *state = State {
                generation,
                started: false,
                catalog,
                index,
                statuses,
                snapshot: Snapshot::empty(),
            };
            state.snapshot = Snapshot::new(0, state.entries());
            debug!(generation, capabilities = pending, "aggregator initialized");
            state.snapshot.clone()
        };

        self.shared.pending.send_replace(pending);
        Ok(snapshot)
    }

    /// Launch every probe concurrently and return without waiting for any.
    ///
    /// Each probe runs in its own task, so a slow, hanging, or failing probe
    /// never holds up the others. Probes are never cancelled. Calling `start`
    /// twice for the same session is a no-op. Fails only when called outside
    /// a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("ProbeAggregator::start must be called from within a tokio runtime")?;

        let (generation, work) = {
            let mut state = lock(&self.shared.state);
            if state.started {
                warn!(
                    generation = state.generation,
                    "probes already started; ignoring start"
                );
                return Ok(());
            }
            state.started = true;
            let work: Vec<(CapabilityId, Probe)> = state
                .catalog
                .descriptors()
                .iter()
                .map(|descriptor| (descriptor.id().clone(), descriptor.probe().clone()))
                .collect();
            (state.generation, work)
        };

        debug!(generation, probes = work.len(), "launching probes");
        for (id, probe) in work {
            let aggregator = self.clone();
            runtime.spawn(async move {
                let settlement = run_probe(probe).await;
                aggregator.settle(generation, &id, settlement);
            });
        }
        Ok(())
    }

    /// The most recently published snapshot.
    pub fn current_snapshot(&self) -> Snapshot {
        lock(&self.shared.state).snapshot.clone()
    }

    /// Register `listener` for every snapshot published from now on.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        lock(&self.shared.listeners).register(Sink::Callback(Box::new(listener)))
    }

    /// Remove a listener. Returns false when `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = lock(&self.shared.listeners);
        let before = listeners.entries.len();
        listeners.entries.retain(|(entry_id, _)| *entry_id != id);
        listeners.entries.len() != before
    }

    /// Stream of snapshots published from now on.
    ///
    /// The channel stays open until the subscription is removed, so consumers
    /// should stop reading once a received snapshot `is_settled`. Dropping the
    /// receiver removes the subscription at the next publish.
    pub fn updates(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<Snapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = lock(&self.shared.listeners).register(Sink::Channel(tx));
        (id, rx)
    }

    /// Wait until no capability of the current session is `Pending`, then
    /// return the current snapshot. Resolves immediately for an empty catalog.
    pub async fn wait_settled(&self) -> Snapshot {
        let mut pending = self.shared.pending.subscribe();
        // The sender lives in `shared`, which `self` keeps alive.
        let _ = pending.wait_for(|remaining| *remaining == 0).await;
        self.current_snapshot()
    }

    fn settle(&self, generation: u64, id: &CapabilityId, settlement: Settlement) {
        let mut listeners = lock(&self.shared.listeners);
        let (snapshot, remaining) = {
            let mut state = lock(&self.shared.state);
            if state.generation != generation {
                debug!(capability = %id, generation, "discarding settlement from a previous session");
                return;
            }
            let Some(position) = state.index.position(id) else {
                warn!(capability = %id, "settlement for unknown capability");
                return;
            };
            let current = state.statuses[position];
            if current.is_terminal() {
                debug!(capability = %id, status = %current, "capability already settled");
                return;
            }
            settlement.log(id);
            state.statuses[position] = settlement.status();
            state.rebuild_snapshot();
            (state.snapshot.clone(), state.pending())
        };

        listeners
            .entries
            .retain(|(subscription, sink)| sink.deliver(*subscription, &snapshot));
        // Published under the listeners lock so counts never arrive out of order
        // and `wait_settled` only wakes after every listener has run.
        self.shared.pending.send_replace(remaining);
    }

    #[cfg(test)]
    fn settle_for_test(&self, id: &str, present: bool) {
        let generation = lock(&self.shared.state).generation;
        self.settle(
            generation,
            &CapabilityId::from(id),
            Settlement::Resolved(present),
        );
    }
}

/// Run one probe in its own task so a panic is contained and reported as a
/// settlement instead of tearing down the aggregator.
async fn run_probe(probe: Probe) -> Settlement {
    match tokio::spawn(async move { probe.run().await }).await {
        Ok(Ok(present)) => Settlement::Resolved(present),
        Ok(Err(err)) => Settlement::Failed(err),
        Err(join_err) => Settlement::Panicked(join_err.to_string()),
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}
