// src/walker.rs

use chrono::Utc;
use git2::{Oid, Repository, Sort};
use indicatif::ProgressBar;
use rayon::ThreadPoolBuilder;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn};

use crate::error::{MineError, UnitError};
use crate::model::{CommitRecord, MiningRun, RepositorySummary, TimeRange};
use crate::reader::{self, MetadataExtractor, NoMetadata, ReadContext};
use crate::run::RunAccumulator;
use crate::sink::{Sink, SinkPolicy};
use crate::tags::TagCatalog;

/// A local repository to mine, plus the name and URL it is reported under.
#[derive(Debug, Clone)]
pub struct RepositorySource {
    git_dir: PathBuf,
    name: String,
    url: String,
}

impl RepositorySource {
    /// Opens the repository once to validate it and derive a default name and URL.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MineError> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|source| MineError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let root = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().trim_end_matches(".git").to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "repository".to_string());
        let url = repo
            .find_remote("origin")
            .ok()
            .and_then(|remote| remote.url().map(String::from))
            .unwrap_or_else(|| format!("file://{}", root.display()));

        Ok(RepositorySource {
            git_dir: repo.path().to_path_buf(),
            name,
            url,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn open_reader(&self) -> Result<Repository, MineError> {
        Repository::open(&self.git_dir).map_err(|source| MineError::Open {
            path: self.git_dir.clone(),
            source,
        })
    }
}

#[derive(Clone)]
pub struct WalkOptions {
    /// Size of the worker pool
    pub threads: usize,
    /// Wall-clock budget for the whole walk; `None` waits for every commit
    pub timeout: Option<Duration>,
    pub range: Option<TimeRange>,
    /// Send the repository summary to the sink before walking
    pub emit_summary: bool,
    pub sink_policy: SinkPolicy,
    /// Advanced once per settled commit
    pub progress: ProgressBar,
}

impl Default for WalkOptions {
    fn default() -> Self {
        WalkOptions {
            threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            timeout: None,
            range: None,
            emit_summary: true,
            sink_policy: SinkPolicy::BestEffort,
            progress: ProgressBar::hidden(),
        }
    }
}

/// What a walk produced
#[derive(Debug)]
pub struct WalkOutcome {
    pub run: MiningRun,
    /// Set when the deadline passed before every commit settled
    pub incomplete: bool,
    /// Commits that were dispatched but never settled
    pub abandoned: usize,
    pub failures: Vec<UnitError>,
}

impl WalkOutcome {
    pub fn is_complete(&self) -> bool {
        !self.incomplete && self.failures.is_empty()
    }
}

/// Recycles independent reader handles onto the same object store.
struct ReaderPool {
    git_dir: PathBuf,
    idle: Mutex<Vec<Repository>>,
}

impl ReaderPool {
    fn new(git_dir: PathBuf, seed: Repository) -> Self {
        ReaderPool {
            git_dir,
            idle: Mutex::new(vec![seed]),
        }
    }

    fn with_reader<T>(&self, f: impl FnOnce(&Repository) -> T) -> Result<T, git2::Error> {
        let idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop();
        let repo = match idle {
            Some(repo) => repo,
            None => Repository::open(&self.git_dir)?,
        };
        let out = f(&repo);
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(repo);
        Ok(out)
    }
}

/// State shared by every worker of one walk
struct Shared {
    run: RunAccumulator,
    readers: ReaderPool,
    tags: TagCatalog,
    sink: Option<Arc<dyn Sink>>,
    metadata: Arc<dyn MetadataExtractor>,
    cancelled: AtomicBool,
}

impl Shared {
    fn process(&self, oid: Oid) -> Result<CommitRecord, UnitError> {
        let hash = oid.to_string();
        let attempt = self.readers.with_reader(|repo| {
            let commit = repo.find_commit(oid).map_err(|source| UnitError::Read {
                hash: hash.clone(),
                source,
            })?;
            let ctx = ReadContext {
                run: &self.run,
                tags: &self.tags,
                sink: self.sink.as_deref(),
                metadata: &*self.metadata,
                cancelled: &self.cancelled,
            };
            reader::read_commit(repo, &commit, &ctx)
        });
        match attempt {
            Ok(result) => result,
            Err(source) => Err(UnitError::Read { hash, source }),
        }
    }

    /// Like `process`, but a panicking unit becomes a failure instead of vanishing.
    fn settle(&self, oid: Oid) -> Result<CommitRecord, UnitError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.process(oid))).unwrap_or_else(|payload| {
            Err(UnitError::Panicked {
                hash: oid.to_string(),
                message: panic_message(&*payload),
            })
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn push_tip(revwalk: &mut git2::Revwalk<'_>, reference: &git2::Reference<'_>) -> Result<(), git2::Error> {
    let name = String::from_utf8_lossy(reference.name_bytes());
    match reference.peel_to_commit() {
        Ok(commit) => revwalk.push(commit.id()),
        Err(e) => {
            warn!(reference = %name, error = %e, "skipping ref that does not lead to a commit");
            Ok(())
        }
    }
}

/// Lists every commit reachable from any ref (and HEAD), newest first.
///
/// Refs that are dangling or point at a tree or blob are skipped.
pub fn enumerate_commits(repo: &Repository, range: Option<TimeRange>) -> Result<Vec<Oid>, git2::Error> {
    let mut revwalk = repo.revwalk()?;
    for reference in repo.references()? {
        push_tip(&mut revwalk, &reference?)?;
    }
    if let Ok(head) = repo.head() {
        push_tip(&mut revwalk, &head)?;
    }
    revwalk.set_sorting(Sort::TIME)?;

    let mut oids = Vec::new();
    for oid in revwalk {
        let oid = oid?;
        if let Some(range) = range {
            let commit = repo.find_commit(oid)?;
            if !range.contains(reader::commit_time(&commit)) {
                continue;
            }
        }
        oids.push(oid);
    }
    Ok(oids)
}

/// Mines `source` with no metadata extraction.
pub fn walk(
    source: &RepositorySource,
    sink: Option<Arc<dyn Sink>>,
    options: &WalkOptions,
) -> Result<WalkOutcome, MineError> {
    walk_with_metadata(source, sink, Arc::new(NoMetadata), options)
}

/// Mines `source` on a pool of `options.threads` workers, one job per commit.
///
/// Blocks until every commit settled or the timeout elapsed. Failed commits,
/// panicking ones included, are collected in the outcome; only setup errors and
/// a rejected summary (or any sink failure under [`SinkPolicy::Mandatory`]) fail
/// the walk itself.
///
/// Once the walk returns, units still running forward nothing further to the
/// sink, except one already inside `persist_commit` when the deadline passed.
pub fn walk_with_metadata(
    source: &RepositorySource,
    sink: Option<Arc<dyn Sink>>,
    metadata: Arc<dyn MetadataExtractor>,
    options: &WalkOptions,
) -> Result<WalkOutcome, MineError> {
    let started = Instant::now();
    let deadline = options.timeout.map(|t| started + t);
    if options.threads == 0 {
        return Err(MineError::NoThreads);
    }

    let _span = info_span!("walk", repository = %source.name()).entered();

    let summary = RepositorySummary {
        name: source.name().to_string(),
        url: source.url().to_string(),
        last_sync: Utc::now(),
    };
    if options.emit_summary {
        if let Some(sink) = &sink {
            sink.persist_repository(&summary).map_err(MineError::Summary)?;
        }
    }

    let repo = source.open_reader()?;
    let oids = enumerate_commits(&repo, options.range)?;
    let tags = TagCatalog::load(&repo)?;
    let dispatched = oids.len();

    info!(
        commits = dispatched,
        tags = tags.len(),
        threads = options.threads,
        "walk started"
    );

    let shared = Arc::new(Shared {
        run: RunAccumulator::new(summary),
        readers: ReaderPool::new(source.git_dir().to_path_buf(), repo),
        tags,
        sink,
        metadata,
        cancelled: AtomicBool::new(false),
    });

    let pool = ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .thread_name(|i| format!("git-miner-{i}"))
        .build()?;

    let (tx, rx) = mpsc::channel();
    for oid in oids {
        let shared = Arc::clone(&shared);
        let tx = tx.clone();
        pool.spawn(move || {
            if shared.cancelled.load(Ordering::Acquire) {
                return;
            }
            let _ = tx.send(shared.settle(oid));
        });
    }
    drop(tx);

    options.progress.set_length(dispatched as u64);
    let mut settled = 0;
    let mut failures = Vec::new();
    let mut timed_out = false;

    while settled < dispatched {
        let next = match deadline {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match next {
            Ok(Ok(record)) => {
                shared.run.merge_commit(record);
            }
            Ok(Err(UnitError::Sink { hash, source })) if options.sink_policy == SinkPolicy::Mandatory => {
                shared.cancelled.store(true, Ordering::Release);
                options.progress.abandon();
                error!(%hash, error = %source, "sink rejected commit, aborting walk");
                return Err(MineError::SinkAborted { hash, source });
            }
            Ok(Err(err)) => {
                warn!(hash = %err.hash(), error = %err, "commit failed");
                failures.push(err);
            }
            Err(RecvTimeoutError::Timeout) => {
                timed_out = true;
                break;
            }
            // Every started unit reports, so this ends an already drained walk
            Err(RecvTimeoutError::Disconnected) => break,
        }
        settled += 1;
        options.progress.inc(1);
    }

    // Units not yet started are skipped; in-flight ones stop before forwarding
    shared.cancelled.store(true, Ordering::Release);
    let abandoned = dispatched - settled;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if timed_out {
        warn!(abandoned, elapsed_ms, "walk timed out");
        options.progress.abandon();
    } else {
        options.progress.finish();
    }

    let run = shared.run.snapshot();
    info!(
        commits = run.commits.len(),
        users = run.users.len(),
        tags = run.tags.len(),
        failures = failures.len(),
        abandoned,
        elapsed_ms,
        "walk finished"
    );

    Ok(WalkOutcome {
        run,
        incomplete: abandoned > 0,
        abandoned,
        failures,
    })
}
