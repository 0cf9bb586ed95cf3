// src/tags.rs

use git2::{Oid, Repository};
use std::collections::BTreeSet;

use crate::error::StageError;
use crate::model::TagRecord;
use crate::run::RunAccumulator;
use crate::sink::Sink;

#[derive(Debug, Clone)]
struct TagRef {
    record: TagRecord,
    /// Commit the tag ultimately points at, if it peels to one
    tip: Option<Oid>,
}

/// Every tag in the repository, resolved once per walk and shared by all workers.
#[derive(Debug, Clone, Default)]
pub struct TagCatalog {
    tags: Vec<TagRef>,
}

impl TagCatalog {
    pub fn load(repo: &Repository) -> Result<Self, git2::Error> {
        let mut tags = Vec::new();
        for reference in repo.references_glob("refs/tags/*")? {
            let reference = reference?;
            let name = String::from_utf8_lossy(reference.shorthand_bytes()).into_owned();
            // Symbolic tag refs have no direct target
            let hash = reference.target().map(|oid| oid.to_string());
            let tip = reference.peel_to_commit().ok().map(|c| c.id());
            tags.push(TagRef {
                record: TagRecord { name, hash },
                tip,
            });
        }
        tags.sort_by(|a, b| a.record.name.cmp(&b.record.name));
        Ok(TagCatalog { tags })
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tags whose history includes `commit`.
    pub fn reaching(&self, repo: &Repository, commit: Oid) -> Result<BTreeSet<TagRecord>, git2::Error> {
        let mut found = BTreeSet::new();
        for tag in &self.tags {
            let Some(tip) = tag.tip else { continue };
            if tip == commit || repo.graph_descendant_of(tip, commit)? {
                found.insert(tag.record.clone());
            }
        }
        Ok(found)
    }
}

/// Finds the tags reaching `commit`, registers them into the run and forwards new ones.
pub(crate) fn associate(
    repo: &Repository,
    catalog: &TagCatalog,
    commit: Oid,
    run: &RunAccumulator,
    sink: Option<&dyn Sink>,
) -> Result<BTreeSet<TagRecord>, StageError> {
    let tags = catalog.reaching(repo, commit)?;
    for tag in &tags {
        if run.register_tag(tag) {
            if let Some(sink) = sink {
                sink.persist_tag(tag)?;
            }
        }
    }
    Ok(tags)
}
