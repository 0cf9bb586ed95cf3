// src/model.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::MineError;

/// Identifies one mined repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub name: String,
    pub url: String,
    pub last_sync: DateTime<Utc>,
}

/// How a single file changed within a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Add,
    Modify,
    Delete,
    Rename,
    Copy,
}

impl ChangeKind {
    pub fn from_delta(delta: git2::Delta) -> Self {
        match delta {
            git2::Delta::Added | git2::Delta::Untracked => ChangeKind::Add,
            git2::Delta::Deleted => ChangeKind::Delete,
            git2::Delta::Renamed => ChangeKind::Rename,
            git2::Delta::Copied => ChangeKind::Copy,
            // Typechange, Modified and the working-tree-only states
            _ => ChangeKind::Modify,
        }
    }
}

/// One file's change within a commit. Ordered by (old path, new path, kind) first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileChangeRecord {
    /// Absent for additions
    pub old_path: Option<String>,
    /// Absent for deletions
    pub new_path: Option<String>,
    pub kind: ChangeKind,
    pub inserted: u64,
    pub deleted: u64,
}

/// A resolved author/committer identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub aliases: BTreeSet<String>,
}

impl UserRecord {
    pub fn new(username: impl Into<String>) -> Self {
        UserRecord {
            username: username.into(),
            aliases: BTreeSet::new(),
        }
    }

    /// Unions `other`'s aliases into this record. Returns true if anything new was added.
    pub fn merge(&mut self, other: &UserRecord) -> bool {
        let before = self.aliases.len();
        self.aliases.extend(other.aliases.iter().cloned());
        self.aliases.len() != before
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagRecord {
    pub name: String,
    /// Absent when the reference could not be resolved to an object id
    pub hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub name: String,
    pub value: String,
}

/// One fully read commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub parent_hash: Option<String>,
    pub parent_count: usize,
    pub author: String,
    pub committer: String,
    pub commit_time: DateTime<Utc>,
    pub short_message: String,
    pub inserted: u64,
    pub deleted: u64,
    pub diff_entries: BTreeSet<FileChangeRecord>,
    pub tags: BTreeSet<TagRecord>,
    pub metadata: BTreeSet<MetadataRecord>,
}

impl CommitRecord {
    pub fn is_root(&self) -> bool {
        self.parent_count == 0
    }
}

/// Inclusive `[since, until]` filter on commit time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    since: DateTime<Utc>,
    until: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self, MineError> {
        if since > until {
            return Err(MineError::InvalidRange { since, until });
        }
        Ok(TimeRange { since, until })
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    pub fn until(&self) -> DateTime<Utc> {
        self.until
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.since <= at && at <= self.until
    }
}

/// The accumulated result of one repository walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningRun {
    pub summary: RepositorySummary,
    pub users: BTreeMap<String, UserRecord>,
    pub tags: BTreeMap<String, TagRecord>,
    pub commits: BTreeMap<String, CommitRecord>,
}

impl MiningRun {
    pub fn commit_hashes(&self) -> BTreeSet<String> {
        self.commits.keys().cloned().collect()
    }

    pub fn user(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn time_range_bounds_are_inclusive() {
        let range = TimeRange::new(at(100), at(200)).unwrap();
        assert!(range.contains(at(100)));
        assert!(range.contains(at(200)));
        assert!(!range.contains(at(99)));
        assert!(!range.contains(at(201)));
    }

    #[test]
    fn inverted_time_range_is_rejected() {
        assert!(matches!(
            TimeRange::new(at(200), at(100)),
            Err(MineError::InvalidRange { .. })
        ));
    }

    #[test]
    fn user_merge_reports_new_aliases_only() {
        let mut user = UserRecord::new("jane doe");
        user.aliases.insert("jane@a.org".into());

        let mut same = UserRecord::new("jane doe");
        same.aliases.insert("jane@a.org".into());
        assert!(!user.merge(&same));

        let mut other = UserRecord::new("jane doe");
        other.aliases.insert("jane@b.org".into());
        assert!(user.merge(&other));
        assert_eq!(user.aliases.len(), 2);
    }

    #[test]
    fn change_kind_serializes_upper_case() {
        let json = serde_json::to_string(&ChangeKind::Rename).unwrap();
        assert_eq!(json, "\"RENAME\"");
        assert_eq!(ChangeKind::from_delta(git2::Delta::Typechange), ChangeKind::Modify);
    }
}
