//! Bounded, append-only history of remediation outcomes.
//!
//! Written only by the loop's learning phase; planners read a snapshot.

use std::collections::VecDeque;

use autoheal_types::{KnowledgeEntry, RemediationStrategy};
use tracing::debug;

/// FIFO-bounded knowledge store.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    entries: VecDeque<KnowledgeEntry>,
    max_entries: usize,
}

impl KnowledgeStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_entries.min(1024)),
            max_entries,
        }
    }

    /// Append an entry, evicting the oldest entries beyond capacity.
    pub fn append(&mut self, entry: KnowledgeEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.max_entries {
            if let Some(evicted) = self.entries.pop_front() {
                debug!(anomaly_type = %evicted.anomaly_type, "Evicted oldest knowledge entry");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Copy of all entries, oldest first.
    pub fn snapshot(&self) -> Vec<KnowledgeEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn success_rate(&self, anomaly_type: &str, strategy: RemediationStrategy) -> Option<f64> {
        success_rate(self.entries.iter(), anomaly_type, strategy)
    }
}

/// Share of successful outcomes among entries for `anomaly_type` whose plan
/// used `strategy`. `None` when there is no history.
pub fn success_rate<'a>(
    entries: impl IntoIterator<Item = &'a KnowledgeEntry>,
    anomaly_type: &str,
    strategy: RemediationStrategy,
) -> Option<f64> {
    let (total, successes) = entries
        .into_iter()
        .filter(|e| e.anomaly_type == anomaly_type && e.used(strategy))
        .fold((0usize, 0usize), |(total, ok), e| {
            (total + 1, ok + usize::from(e.success))
        });

    if total == 0 {
        None
    } else {
        Some(successes as f64 / total as f64)
    }
}

/// Entries recorded for `anomaly_type`, oldest first.
pub fn entries_for<'a>(
    entries: &'a [KnowledgeEntry],
    anomaly_type: &'a str,
) -> impl Iterator<Item = &'a KnowledgeEntry> + 'a {
    entries.iter().filter(move |e| e.anomaly_type == anomaly_type)
}
