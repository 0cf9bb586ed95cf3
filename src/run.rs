// src/run.rs

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::model::{CommitRecord, MiningRun, RepositorySummary, TagRecord, UserRecord};

/// Shared, lock-protected state of a walk in progress.
///
/// Every merge happens under the lock of the set it touches, so two workers
/// resolving the same username end up with one record holding both alias sets.
#[derive(Debug)]
pub struct RunAccumulator {
    summary: RepositorySummary,
    users: Mutex<BTreeMap<String, UserRecord>>,
    tags: Mutex<BTreeMap<String, TagRecord>>,
    commits: Mutex<BTreeMap<String, CommitRecord>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // The maps stay consistent even if a holder panicked mid-walk
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunAccumulator {
    pub fn new(summary: RepositorySummary) -> Self {
        RunAccumulator {
            summary,
            users: Mutex::new(BTreeMap::new()),
            tags: Mutex::new(BTreeMap::new()),
            commits: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn summary(&self) -> &RepositorySummary {
        &self.summary
    }

    /// Inserts or unions `user`. Returns true if the run changed.
    ///
    /// `on_change` sees the merged record while the user set is still locked,
    /// so successive calls for one username observe growing alias sets in order.
    /// The merge is kept even if `on_change` fails.
    pub fn register_user<E>(
        &self,
        user: UserRecord,
        on_change: impl FnOnce(&UserRecord) -> Result<(), E>,
    ) -> Result<bool, E> {
        let mut users = lock(&self.users);
        let merged = match users.entry(user.username.clone()) {
            Entry::Occupied(entry) => {
                let existing = entry.into_mut();
                if !existing.merge(&user) {
                    return Ok(false);
                }
                existing
            }
            Entry::Vacant(entry) => entry.insert(user),
        };
        on_change(merged)?;
        Ok(true)
    }

    /// Returns true if a tag with this name was not yet known.
    pub fn register_tag(&self, tag: &TagRecord) -> bool {
        let mut tags = lock(&self.tags);
        if tags.contains_key(&tag.name) {
            return false;
        }
        tags.insert(tag.name.clone(), tag.clone());
        true
    }

    /// Returns false if a commit with the same hash was already merged.
    pub fn merge_commit(&self, commit: CommitRecord) -> bool {
        let mut commits = lock(&self.commits);
        if commits.contains_key(&commit.hash) {
            return false;
        }
        commits.insert(commit.hash.clone(), commit);
        true
    }

    pub fn commit_count(&self) -> usize {
        lock(&self.commits).len()
    }

    pub fn snapshot(&self) -> MiningRun {
        MiningRun {
            summary: self.summary.clone(),
            users: lock(&self.users).clone(),
            tags: lock(&self.tags).clone(),
            commits: lock(&self.commits).clone(),
        }
    }
}
