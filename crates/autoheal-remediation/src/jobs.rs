//! Registry of remediation jobs, queried through `get_job`/`list_jobs`.

use std::collections::VecDeque;

use autoheal_types::{JobId, JobStatus, RemediationJob};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{RemediationError, RemediationResult};

/// Jobs written by the engine and readable concurrently by callers.
pub struct JobRegistry {
    jobs: DashMap<JobId, RemediationJob>,
    /// Insertion order, oldest first.
    order: Mutex<VecDeque<JobId>>,
    max_retained: usize,
}

impl JobRegistry {
    pub fn new(max_retained: usize) -> Self {
        Self {
            jobs: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            max_retained,
        }
    }

    /// Insert or replace a job snapshot.
    pub(crate) fn upsert(&self, job: RemediationJob) {
        let id = job.id.clone();
        if self.jobs.insert(id.clone(), job).is_none() {
            self.order.lock().push_back(id);
            self.evict();
        }
    }

    /// Drop the oldest jobs until back within the retention limit.
    ///
    /// Terminal jobs go first. Jobs held for approval are only evicted when
    /// terminal jobs alone cannot make room. Running jobs are never evicted.
    fn evict(&self) {
        let mut order = self.order.lock();
        let mut excess = order.len().saturating_sub(self.max_retained);
        if excess == 0 {
            return;
        }

        self.evict_where(&mut order, &mut excess, |job| job.status.is_terminal());
        if excess > 0 {
            self.evict_where(&mut order, &mut excess, is_held);
        }
    }

    fn evict_where(
        &self,
        order: &mut VecDeque<JobId>,
        excess: &mut usize,
        evictable: impl Fn(&RemediationJob) -> bool,
    ) {
        order.retain(|id| {
            if *excess == 0 {
                return true;
            }
            let removed = match self.jobs.remove_if(id, |_, job| evictable(job)) {
                Some((_, job)) => Some(job),
                // Already gone from the map; drop the stale order entry.
                None if !self.jobs.contains_key(id) => None,
                None => return true,
            };
            *excess -= 1;
            match removed {
                Some(job) if is_held(&job) => {
                    warn!(job_id = %id, "Evicted job still awaiting approval")
                }
                _ => debug!(job_id = %id, "Evicted retained job"),
            }
            false
        });
    }

    /// Atomically move a held job to `InProgress` so it runs at most once.
    pub(crate) fn claim_for_approval(&self, id: &JobId) -> RemediationResult<RemediationJob> {
        let mut entry = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| RemediationError::JobNotFound(id.clone()))?;
        if !is_held(&entry) {
            return Err(RemediationError::InvalidJobState {
                job_id: entry.id.clone(),
                status: entry.status,
            });
        }
        entry.status = JobStatus::InProgress;
        entry.started_at = Some(Utc::now());
        Ok(entry.value().clone())
    }

    pub fn get(&self, id: &JobId) -> Option<RemediationJob> {
        self.jobs.get(id).map(|j| j.value().clone())
    }

    /// Jobs in submission order, optionally filtered by status.
    pub fn list(&self, status: Option<JobStatus>) -> Vec<RemediationJob> {
        let order = self.order.lock();
        order
            .iter()
            .filter_map(|id| self.get(id))
            .filter(|job| status.map_or(true, |s| job.status == s))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

fn is_held(job: &RemediationJob) -> bool {
    job.requires_approval && job.status == JobStatus::Pending
}
