//! Sync tracker for non-blocking persistence
//!
//! Keeps working state in memory and records which take-offs changed since
//! they were last saved. The host snapshots pending jobs, runs them wherever
//! it likes, and acknowledges each one. Every change bumps a revision so an
//! acknowledgement for an older snapshot never marks newer edits as saved.

use crate::ledger::TakeoffLedger;
use crate::measurement::TakeoffId;
use crate::record::TakeoffRecord;
use crate::store::{StoreError, TakeoffStore};
use log::{debug, warn};
use std::collections::BTreeMap;

/// What a job asks the store to do
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOp {
    /// Write the take-off as it was when the job was created
    Save(TakeoffRecord),
    /// Remove the take-off from storage
    Delete,
}

/// One unit of persistence work
#[derive(Debug, Clone, PartialEq)]
pub struct SyncJob {
    pub takeoff: TakeoffId,
    pub revision: u64,
    pub op: SyncOp,
}

/// A job that failed; the in-memory state is kept and the job stays queued
#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceFailure {
    pub takeoff: TakeoffId,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingChange {
    revision: u64,
    deleted: bool,
}

/// Tracks take-offs whose in-memory state is ahead of storage
#[derive(Debug, Default, Clone)]
pub struct SyncTracker {
    next_revision: u64,
    pending: BTreeMap<TakeoffId, PendingChange>,
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take-off created or edited
    pub fn mark_changed(&mut self, takeoff: TakeoffId) {
        self.mark(takeoff, false);
    }

    /// Take-off deleted
    pub fn mark_deleted(&mut self, takeoff: TakeoffId) {
        self.mark(takeoff, true);
    }

    fn mark(&mut self, takeoff: TakeoffId, deleted: bool) {
        self.next_revision += 1;
        self.pending.insert(takeoff, PendingChange { revision: self.next_revision, deleted });
    }

    pub fn is_clean(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_pending(&self, takeoff: TakeoffId) -> bool {
        self.pending.contains_key(&takeoff)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Snapshot a job for every pending take-off
    pub fn jobs(&self, ledger: &TakeoffLedger) -> Vec<SyncJob> {
        self.pending
            .iter()
            .map(|(&takeoff, change)| {
                let op = match ledger.get(takeoff) {
                    Some(current) if !change.deleted => SyncOp::Save(TakeoffRecord::from(current)),
                    _ => SyncOp::Delete,
                };
                SyncJob { takeoff, revision: change.revision, op }
            })
            .collect()
    }

    /// Acknowledge a job
    ///
    /// Success clears the take-off unless it changed again after the job was
    /// created. Failure leaves it queued and returns a notification.
    pub fn complete(
        &mut self,
        job: &SyncJob,
        result: Result<(), StoreError>,
    ) -> Option<PersistenceFailure> {
        match result {
            Ok(()) => {
                let current = self.pending.get(&job.takeoff).map(|c| c.revision);
                if current == Some(job.revision) {
                    self.pending.remove(&job.takeoff);
                    debug!(
                        "event=sync_complete module=sync status=ok takeoff={} revision={}",
                        job.takeoff, job.revision
                    );
                } else {
                    debug!(
                        "event=sync_complete module=sync status=stale takeoff={} revision={}",
                        job.takeoff, job.revision
                    );
                }
                None
            }
            Err(err) => {
                warn!(
                    "event=sync_complete module=sync status=error takeoff={} revision={} error={}",
                    job.takeoff, job.revision, err
                );
                Some(PersistenceFailure { takeoff: job.takeoff, message: err.to_string() })
            }
        }
    }

    /// Run every pending job against `store` synchronously
    pub fn flush(
        &mut self,
        ledger: &TakeoffLedger,
        store: &mut dyn TakeoffStore,
    ) -> Vec<PersistenceFailure> {
        self.jobs(ledger)
            .into_iter()
            .filter_map(|job| {
                let result = match &job.op {
                    SyncOp::Save(record) => store.save(record),
                    SyncOp::Delete => store.delete(job.takeoff),
                };
                self.complete(&job, result)
            })
            .collect()
    }

    /// Drop the pending change for a take-off whose stored copy was just loaded
    pub fn forget(&mut self, takeoff: TakeoffId) -> bool {
        self.pending.remove(&takeoff).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::MeasurementKind;
    use crate::store::MemoryStore;

    struct FailingStore;

    impl TakeoffStore for FailingStore {
        fn save(&mut self, _record: &TakeoffRecord) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".to_string()))
        }

        fn load(&self, _id: TakeoffId) -> Result<Option<TakeoffRecord>, StoreError> {
            Ok(None)
        }

        fn load_all(&self) -> Result<Vec<TakeoffRecord>, StoreError> {
            Ok(Vec::new())
        }

        fn delete(&mut self, _id: TakeoffId) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".to_string()))
        }
    }

    fn ledger_with(name: &str) -> (TakeoffLedger, TakeoffId) {
        let mut ledger = TakeoffLedger::new();
        let id = ledger.create_takeoff(name, MeasurementKind::Count).expect("created").id();
        (ledger, id)
    }

    #[test]
    fn stale_acknowledgement_keeps_newer_change_queued() {
        let (mut ledger, id) = ledger_with("Sockets");
        let mut tracker = SyncTracker::new();
        tracker.mark_changed(id);

        let jobs = tracker.jobs(&ledger);
        assert_eq!(jobs.len(), 1);

        ledger.rename_takeoff(id, "Double sockets").expect("renamed");
        tracker.mark_changed(id);

        assert!(tracker.complete(&jobs[0], Ok(())).is_none());
        assert!(tracker.is_pending(id));

        let jobs = tracker.jobs(&ledger);
        let SyncOp::Save(record) = &jobs[0].op else {
            panic!("expected save job");
        };
        assert_eq!(record.name, "Double sockets");
        tracker.complete(&jobs[0], Ok(()));
        assert!(tracker.is_clean());
    }

    #[test]
    fn failed_job_stays_queued_with_notification() {
        let (ledger, id) = ledger_with("Switches");
        let mut tracker = SyncTracker::new();
        tracker.mark_changed(id);

        let failures = tracker.flush(&ledger, &mut FailingStore);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].takeoff, id);
        assert!(failures[0].message.contains("disk full"));
        assert!(tracker.is_pending(id));

        let mut store = MemoryStore::new();
        assert!(tracker.flush(&ledger, &mut store).is_empty());
        assert!(tracker.is_clean());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn deleted_takeoff_produces_delete_job() {
        let (mut ledger, id) = ledger_with("Fans");
        let mut tracker = SyncTracker::new();
        let mut store = MemoryStore::new();
        tracker.mark_changed(id);
        tracker.flush(&ledger, &mut store);
        assert_eq!(store.len(), 1);

        ledger.delete_takeoff(id).expect("deleted");
        tracker.mark_deleted(id);
        assert_eq!(tracker.jobs(&ledger)[0].op, SyncOp::Delete);

        tracker.flush(&ledger, &mut store);
        assert!(store.is_empty());
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn forget_drops_only_that_takeoff() {
        let (mut ledger, first) = ledger_with("Fans");
        let second = ledger.create_takeoff("Vents", MeasurementKind::Count).expect("created").id();
        let mut tracker = SyncTracker::new();
        tracker.mark_deleted(first);
        tracker.mark_changed(second);

        assert!(tracker.forget(first));
        assert!(!tracker.forget(first));
        assert!(!tracker.is_pending(first));
        assert!(tracker.is_pending(second));
    }
}
