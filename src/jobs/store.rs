//! In-memory job store.
//!
//! Each job lives in its own slot guarded by its own mutex, so updates to one
//! job are strictly serialized while different jobs never wait on each other.
//! The outer map lock is only held long enough to find or detach a slot.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::error::{ServiceError, ServiceResult};

use super::models::{Job, JobPhase};

struct JobSlot {
    job: Job,
    /// Set once the slot has been detached from the map. Updates racing with
    /// a delete observe this and fail instead of mutating a dead entry.
    removed: bool,
}

type GuardedSlot = Arc<Mutex<JobSlot>>;

#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, GuardedSlot>>,
}

fn lock_slot(slot: &GuardedSlot) -> MutexGuard<'_, JobSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, job: Job) -> ServiceResult<()> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        match jobs.entry(job.id.clone()) {
            Entry::Occupied(_) => Err(ServiceError::Conflict(job.id)),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(JobSlot {
                    job,
                    removed: false,
                })));
                Ok(())
            }
        }
    }

    fn slot(&self, id: &str) -> ServiceResult<GuardedSlot> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    pub fn get(&self, id: &str) -> ServiceResult<Job> {
        let slot = self.slot(id)?;
        let slot = lock_slot(&slot);
        if slot.removed {
            return Err(ServiceError::NotFound(id.to_string()));
        }
        Ok(slot.job.clone())
    }

    /// Atomically applies `mutator` to the job.
    ///
    /// The mutator works on a copy which is committed only if it returns `Ok`,
    /// so a rejected transition leaves the stored job untouched. Updating a
    /// missing id fails with `NotFound` and never recreates the entry.
    pub fn update<R, F>(&self, id: &str, mutator: F) -> ServiceResult<R>
    where
        F: FnOnce(&mut Job) -> ServiceResult<R>,
    {
        let slot = self.slot(id)?;
        let mut slot = lock_slot(&slot);
        if slot.removed {
            return Err(ServiceError::NotFound(id.to_string()));
        }
        let mut working = slot.job.clone();
        let result = mutator(&mut working)?;
        slot.job = working;
        Ok(result)
    }

    /// Removes the job and returns its last state. Idempotent.
    pub fn remove(&self, id: &str) -> Option<Job> {
        let slot = self
            .jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)?;
        let mut slot = lock_slot(&slot);
        slot.removed = true;
        Some(slot.job.clone())
    }

    /// Removes the job, returning whether an entry existed.
    pub fn delete(&self, id: &str) -> bool {
        self.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of jobs whose background work is still in flight.
    pub fn count_in_flight(&self) -> usize {
        let slots: Vec<GuardedSlot> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        slots
            .iter()
            .filter(|slot| {
                matches!(
                    lock_slot(slot).job.phase,
                    JobPhase::Queued | JobPhase::Downloading | JobPhase::Converting
                )
            })
            .count()
    }
}
