// src/diff.rs

use git2::{Commit, DiffFindOptions, DiffOptions, Patch, Repository};
use std::collections::BTreeSet;

use crate::model::{ChangeKind, FileChangeRecord};

/// The tree a commit is diffed against
pub enum ReferencePoint<'r> {
    /// Root commits are diffed against nothing
    EmptyTree,
    /// Merges only ever use their first parent
    FirstParent(Commit<'r>),
}

impl<'r> ReferencePoint<'r> {
    pub fn of(commit: &Commit<'r>) -> Result<Self, git2::Error> {
        if commit.parent_count() == 0 {
            Ok(ReferencePoint::EmptyTree)
        } else {
            Ok(ReferencePoint::FirstParent(commit.parent(0)?))
        }
    }
}

/// Computes per-file insert/delete counts between `reference` and `commit`.
///
/// Whitespace-only edits don't count as changed lines, and an add/delete pair
/// with similar content collapses into one `RENAME` (or `COPY`) entry.
pub fn diff_commit(
    repo: &Repository,
    commit: &Commit<'_>,
    reference: &ReferencePoint<'_>,
) -> Result<BTreeSet<FileChangeRecord>, git2::Error> {
    let base_tree = match reference {
        ReferencePoint::EmptyTree => None,
        ReferencePoint::FirstParent(parent) => Some(parent.tree()?),
    };
    let current_tree = commit.tree()?;

    let mut diff_opts = DiffOptions::new();
    diff_opts.ignore_whitespace(true);
    diff_opts.context_lines(0);

    let mut diff = repo.diff_tree_to_tree(base_tree.as_ref(), Some(&current_tree), Some(&mut diff_opts))?;

    let mut find_opts = DiffFindOptions::new();
    find_opts.renames(true);
    find_opts.copies(true);
    find_opts.ignore_whitespace(true);
    diff.find_similar(Some(&mut find_opts))?;

    let mut changes = BTreeSet::new();
    for (idx, delta) in diff.deltas().enumerate() {
        let kind = ChangeKind::from_delta(delta.status());
        let old_path = delta.old_file().path().map(|p| p.to_string_lossy().into_owned());
        let new_path = delta.new_file().path().map(|p| p.to_string_lossy().into_owned());

        // Binary deltas have no patch text and count as zero lines
        let (inserted, deleted) = match Patch::from_diff(&diff, idx)? {
            Some(patch) => {
                let (_context, additions, deletions) = patch.line_stats()?;
                (additions as u64, deletions as u64)
            }
            None => (0, 0),
        };

        changes.insert(FileChangeRecord {
            old_path: if kind == ChangeKind::Add { None } else { old_path },
            new_path: if kind == ChangeKind::Delete { None } else { new_path },
            kind,
            inserted,
            deleted,
        });
    }

    Ok(changes)
}

/// Sums per-file counts into commit totals as `(inserted, deleted)`.
pub fn totals<'a>(changes: impl IntoIterator<Item = &'a FileChangeRecord>) -> (u64, u64) {
    changes
        .into_iter()
        .fold((0, 0), |(ins, del), c| (ins + c.inserted, del + c.deleted))
}
