#![allow(dead_code)]

use git2::{Oid, Repository, Signature, Time};
use git_miner::{CommitRecord, RepositorySummary, Sink, SinkError, TagRecord, UserRecord};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

pub const JANE: (&str, &str) = ("Jane Doe", "jane@example.com");
pub const BOB: (&str, &str) = ("Bob", "bob@example.com");

/// A throw-away repository whose commits are written straight into the object store.
pub struct Fixture {
    pub dir: TempDir,
    pub repo: Repository,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = Repository::init(dir.path()).expect("git init");
        Fixture { dir, repo }
    }

    pub fn tree(&self, files: &[(&str, &str)]) -> Oid {
        let mut builder = self.repo.treebuilder(None).expect("treebuilder");
        for (path, content) in files {
            let blob = self.repo.blob(content.as_bytes()).expect("blob");
            builder.insert(path, blob, 0o100644).expect("insert");
        }
        builder.write().expect("write tree")
    }

    /// Commits a full snapshot of `files` on top of HEAD.
    pub fn commit(&self, files: &[(&str, &str)], who: (&str, &str), time: i64, message: &str) -> Oid {
        let parents: Vec<Oid> = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .into_iter()
            .collect();
        self.commit_on(Some("HEAD"), &parents, files, who, time, message)
    }

    pub fn commit_on(
        &self,
        update_ref: Option<&str>,
        parents: &[Oid],
        files: &[(&str, &str)],
        who: (&str, &str),
        time: i64,
        message: &str,
    ) -> Oid {
        let tree = self.repo.find_tree(self.tree(files)).expect("find tree");
        let sig = Signature::new(who.0, who.1, &Time::new(time, 0)).expect("signature");
        let parents: Vec<_> = parents
            .iter()
            .map(|oid| self.repo.find_commit(*oid).expect("parent"))
            .collect();
        let parent_refs: Vec<_> = parents.iter().collect();
        self.repo
            .commit(update_ref, &sig, &sig, message, &tree, &parent_refs)
            .expect("commit")
    }

    pub fn tag(&self, name: &str, target: Oid) {
        let object = self.repo.find_object(target, None).expect("object");
        self.repo.tag_lightweight(name, &object, false).expect("tag");
    }

    pub fn annotated_tag(&self, name: &str, target: Oid) -> Oid {
        let object = self.repo.find_object(target, None).expect("object");
        let sig = Signature::new("Release Bot", "release@example.com", &Time::new(0, 0)).expect("signature");
        self.repo
            .tag(name, &object, &sig, "release", false)
            .expect("annotated tag")
    }

    /// Writes a loose ref by hand, so it may name an object that does not exist.
    pub fn raw_ref(&self, name: &str, target: &str) {
        let path = self.repo.path().join(name);
        std::fs::create_dir_all(path.parent().expect("ref dir")).expect("mkdir");
        std::fs::write(path, format!("{target}\n")).expect("write ref");
    }

    pub fn blob(&self, content: &str) -> Oid {
        self.repo.blob(content.as_bytes()).expect("blob")
    }

    pub fn branch(&self, name: &str, target: Oid) {
        let commit = self.repo.find_commit(target).expect("commit");
        self.repo.branch(name, &commit, false).expect("branch");
    }
}

/// Keeps every record it receives; optionally slow or failing.
#[derive(Default)]
pub struct RecordingSink {
    pub summaries: Mutex<Vec<RepositorySummary>>,
    pub commits: Mutex<Vec<CommitRecord>>,
    pub tags: Mutex<Vec<TagRecord>>,
    pub users: Mutex<Vec<UserRecord>>,
    pub commit_delay: Option<Duration>,
    pub reject_commits: bool,
}

impl RecordingSink {
    pub fn slow(delay: Duration) -> Self {
        RecordingSink {
            commit_delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn rejecting() -> Self {
        RecordingSink {
            reject_commits: true,
            ..Default::default()
        }
    }
}

impl Sink for RecordingSink {
    fn persist_repository(&self, summary: &RepositorySummary) -> Result<(), SinkError> {
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }

    fn persist_commit(&self, commit: &CommitRecord) -> Result<(), SinkError> {
        if let Some(delay) = self.commit_delay {
            thread::sleep(delay);
        }
        if self.reject_commits {
            return Err(SinkError::Rejected("503 service unavailable".to_string()));
        }
        self.commits.lock().unwrap().push(commit.clone());
        Ok(())
    }

    fn persist_tag(&self, tag: &TagRecord) -> Result<(), SinkError> {
        self.tags.lock().unwrap().push(tag.clone());
        Ok(())
    }

    fn persist_user(&self, user: &UserRecord) -> Result<(), SinkError> {
        self.users.lock().unwrap().push(user.clone());
        Ok(())
    }
}
