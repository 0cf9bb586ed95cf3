// src/reader.rs

use chrono::{DateTime, Utc};
use git2::{Commit, Repository};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::diff::{self, ReferencePoint};
use crate::error::{StageError, UnitError};
use crate::identity;
use crate::model::{CommitRecord, MetadataRecord};
use crate::run::RunAccumulator;
use crate::sink::Sink;
use crate::tags::{self, TagCatalog};

/// Hook for attaching extra key/value records to each commit.
pub trait MetadataExtractor: Send + Sync {
    fn extract(
        &self,
        repo: &Repository,
        commit: &Commit<'_>,
    ) -> Result<BTreeSet<MetadataRecord>, git2::Error>;
}

/// Attaches nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl MetadataExtractor for NoMetadata {
    fn extract(&self, _repo: &Repository, _commit: &Commit<'_>) -> Result<BTreeSet<MetadataRecord>, git2::Error> {
        Ok(BTreeSet::new())
    }
}

/// Everything a worker shares with the rest of the walk while reading a commit
pub struct ReadContext<'a> {
    pub run: &'a RunAccumulator,
    pub tags: &'a TagCatalog,
    pub sink: Option<&'a dyn Sink>,
    pub metadata: &'a dyn MetadataExtractor,
    /// Set once the walk stops waiting; finished records are then not forwarded
    pub cancelled: &'a AtomicBool,
}

/// Committer time of `commit` in UTC
pub fn commit_time(commit: &Commit<'_>) -> DateTime<Utc> {
    DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_default()
}

/// Reads `commit` into a complete record, or fails as a whole.
///
/// Users and tags touched before a failing step stay registered in the run;
/// those merges are idempotent.
pub fn read_commit(
    repo: &Repository,
    commit: &Commit<'_>,
    ctx: &ReadContext<'_>,
) -> Result<CommitRecord, UnitError> {
    let hash = commit.id().to_string();
    read_stages(repo, commit, hash.clone(), ctx).map_err(|e| e.for_commit(&hash))
}

fn read_stages(
    repo: &Repository,
    commit: &Commit<'_>,
    hash: String,
    ctx: &ReadContext<'_>,
) -> Result<CommitRecord, StageError> {
    let parent_count = commit.parent_count();
    let parent_hash = (parent_count > 0)
        .then(|| commit.parent_id(0))
        .transpose()?
        .map(|oid| oid.to_string());
    let short_message = commit
        .summary_bytes()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default();

    let author = identity::register(&commit.author(), ctx.run, ctx.sink)?;
    let committer = identity::register(&commit.committer(), ctx.run, ctx.sink)?;

    let reference = ReferencePoint::of(commit)?;
    let diff_entries = diff::diff_commit(repo, commit, &reference)?;
    let (inserted, deleted) = diff::totals(&diff_entries);

    let tags = tags::associate(repo, ctx.tags, commit.id(), ctx.run, ctx.sink)?;
    let metadata = ctx.metadata.extract(repo, commit)?;

    let record = CommitRecord {
        hash,
        parent_hash,
        parent_count,
        author,
        committer,
        commit_time: commit_time(commit),
        short_message,
        inserted,
        deleted,
        diff_entries,
        tags,
        metadata,
    };

    if let Some(sink) = ctx.sink {
        if ctx.cancelled.load(Ordering::Acquire) {
            return Err(StageError::Cancelled);
        }
        sink.persist_commit(&record)?;
    }

    debug!(
        hash = %record.hash,
        diffs = record.diff_entries.len(),
        inserted = record.inserted,
        deleted = record.deleted,
        author = %record.author,
        committer = %record.committer,
        tags = record.tags.len(),
        metadata = record.metadata.len(),
        "commit read"
    );

    Ok(record)
}
