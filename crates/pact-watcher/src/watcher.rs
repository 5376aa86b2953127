//! The single-timer deadline watcher.
//!
//! All timer bookkeeping lives in one mutex-guarded [`TimerSlot`]; every
//! queue mutation and every arm/disarm of the timer happens under that
//! lock, which is what makes the single-timer invariant local to this file.
//! The spawned timer task carries a generation number and re-checks it
//! under the lock before acting, so a timer that lost a preemption race
//! fires into nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use pact_core::{BridgeError, DealId, DealScheduler, EntryId, EntryStatus, TimeoutEntry, TimeoutSink};
use pact_ledger::Ledger;

use crate::error::WatcherError;

/// The deadline watcher. Cheap to clone; all state is behind one [`Arc`].
#[derive(Clone)]
pub struct TimeoutWatcher {
    inner: Arc<Inner>,
}

struct Inner {
    ledger: Arc<dyn Ledger>,
    sink: Arc<dyn TimeoutSink>,
    slot: Mutex<TimerSlot>,
    runtime: Handle,
}

/// The one live timer, if any.
#[derive(Default)]
struct TimerSlot {
    /// Bumped every time a timer is armed. A firing task whose generation
    /// no longer matches was preempted and must do nothing.
    generation: u64,
    watching: Option<Watched>,
}

struct Watched {
    entry: EntryId,
    deadline: DateTime<Utc>,
    cancel: oneshot::Sender<()>,
}

impl TimeoutWatcher {
    /// Build a watcher on the current Tokio runtime.
    pub fn new(
        ledger: Arc<dyn Ledger>,
        sink: Arc<dyn TimeoutSink>,
    ) -> Result<Self, WatcherError> {
        let runtime = Handle::try_current().map_err(|_| WatcherError::NoRuntime)?;
        Ok(Self {
            inner: Arc::new(Inner {
                ledger,
                sink,
                slot: Mutex::new(TimerSlot::default()),
                runtime,
            }),
        })
    }

    /// Queue a deal for resolution at `deadline` (RFC 3339).
    ///
    /// If the new deadline beats the one the live timer is bound to, the
    /// timer is preempted: the superseded row returns to `Queued` and the
    /// new one takes the slot.
    pub fn hold_and_watch(&self, deal: DealId, deadline: &str) -> Result<(), WatcherError> {
        let parsed = DateTime::parse_from_rfc3339(deadline)
            .map_err(|source| WatcherError::InvalidDeadline {
                raw: deadline.to_string(),
                source,
            })?
            .with_timezone(&Utc);
        let entry = TimeoutEntry::new(deal.clone(), parsed);

        let mut slot = self.inner.slot.lock();
        self.inner.ledger.enqueue(entry)?;
        debug!(deal = %deal, %parsed, "queued deal deadline");

        match &slot.watching {
            // The live timer still holds the earliest deadline.
            Some(watched) if parsed >= watched.deadline => return Ok(()),
            Some(_) => {
                if let Some(watched) = slot.watching.take() {
                    // The task may already be past cancellation; the
                    // generation bump in promote makes its fire stale anyway.
                    let _ = watched.cancel.send(());
                    self.inner
                        .ledger
                        .set_entry_status(&watched.entry, EntryStatus::Queued)?;
                    debug!(entry = %watched.entry, "preempted live timer");
                }
            }
            None => {}
        }
        Inner::promote_locked(&self.inner, &mut slot)
    }

    /// Re-arm the timer from the persisted queue, typically on boot. The
    /// `Watching` row left by a crash gets the slot back; absent one, the
    /// earliest `Queued` row does.
    pub fn recover(&self) -> Result<(), WatcherError> {
        let pending = self
            .inner
            .ledger
            .entries()?
            .iter()
            .filter(|e| e.status != EntryStatus::Processed)
            .count();
        info!(pending, "recovering timeout queue");
        let mut slot = self.inner.slot.lock();
        Inner::promote_locked(&self.inner, &mut slot)
    }
}

impl Inner {
    /// Bind the timer to the first due entry. No-op when a timer is
    /// already live or the queue is drained. Caller holds the slot lock.
    fn promote_locked(inner: &Arc<Inner>, slot: &mut TimerSlot) -> Result<(), WatcherError> {
        if slot.watching.is_some() {
            return Ok(());
        }
        let Some(entry) = inner.ledger.first_due()? else {
            debug!("timeout queue drained");
            return Ok(());
        };
        if entry.status != EntryStatus::Watching {
            inner
                .ledger
                .set_entry_status(&entry.id, EntryStatus::Watching)?;
        }
        slot.generation += 1;
        let generation = slot.generation;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        slot.watching = Some(Watched {
            entry: entry.id.clone(),
            deadline: entry.deadline,
            cancel: cancel_tx,
        });
        debug!(entry = %entry.id, deal = %entry.deal, deadline = %entry.deadline, generation, "armed timer");

        let task = Arc::clone(inner);
        inner.runtime.spawn(async move {
            task.run_timer(generation, entry, cancel_rx).await;
        });
        Ok(())
    }

    async fn run_timer(
        self: Arc<Self>,
        generation: u64,
        entry: TimeoutEntry,
        cancel: oneshot::Receiver<()>,
    ) {
        let remaining = (entry.deadline - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        tokio::select! {
            _ = tokio::time::sleep(remaining) => Inner::on_fire(&self, generation, entry),
            _ = cancel => {
                debug!(entry = %entry.id, generation, "timer cancelled");
            }
        }
    }

    /// The timer elapsed: mark the entry processed, tell the engine, and
    /// hand the slot to the next entry in line.
    fn on_fire(inner: &Arc<Inner>, generation: u64, entry: TimeoutEntry) {
        {
            let mut slot = inner.slot.lock();
            if slot.generation != generation {
                // Preempted between the sleep elapsing and this lock.
                debug!(entry = %entry.id, generation, "stale timer fire skipped");
                return;
            }
            slot.watching = None;
            if let Err(err) = inner
                .ledger
                .set_entry_status(&entry.id, EntryStatus::Processed)
            {
                error!(entry = %entry.id, %err, "failed to mark queue entry processed");
            }
        }
        info!(deal = %entry.deal, deadline = %entry.deadline, "deal deadline fired");

        // Outside the lock: the engine's resolution path takes its own time
        // and must not block queue mutations.
        if let Err(err) = inner.sink.deal_timeout(entry.deal.clone()) {
            error!(deal = %entry.deal, %err, "engine rejected deadline notification");
        }

        let mut slot = inner.slot.lock();
        if let Err(err) = Inner::promote_locked(inner, &mut slot) {
            error!(%err, "failed to arm the next timer");
        }
    }
}

impl DealScheduler for TimeoutWatcher {
    fn hold_and_watch(&self, deal: DealId, deadline: &str) -> Result<(), BridgeError> {
        TimeoutWatcher::hold_and_watch(self, deal, deadline)
            .map_err(|e| BridgeError::new(e.to_string()))
    }
}
