// src/error.rs

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop a walk before or while it runs.
#[derive(Debug, Error)]
pub enum MineError {
    #[error("cannot open repository at {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("invalid time range: since {since} is after until {until}")]
    InvalidRange {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },

    #[error("thread count must be at least 1")]
    NoThreads,

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// Enumerating commits or loading tags failed
    #[error("failed to read repository: {0}")]
    Repository(#[from] git2::Error),

    #[error("sink rejected repository summary: {0}")]
    Summary(#[source] SinkError),

    #[error("walk aborted, sink rejected commit {hash}: {source}")]
    SinkAborted {
        hash: String,
        #[source]
        source: SinkError,
    },
}

/// Failure of a single commit unit. Never aborts the walk on its own.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("commit {hash}: repository read failed: {source}")]
    Read {
        hash: String,
        #[source]
        source: git2::Error,
    },

    #[error("commit {hash}: sink rejected record: {source}")]
    Sink {
        hash: String,
        #[source]
        source: SinkError,
    },

    #[error("commit {hash}: worker panicked: {message}")]
    Panicked { hash: String, message: String },

    /// The walk ended before this commit was forwarded
    #[error("commit {hash}: walk cancelled")]
    Cancelled { hash: String },
}

impl UnitError {
    pub fn hash(&self) -> &str {
        match self {
            UnitError::Read { hash, .. }
            | UnitError::Sink { hash, .. }
            | UnitError::Panicked { hash, .. }
            | UnitError::Cancelled { hash } => hash,
        }
    }

    pub fn is_sink(&self) -> bool {
        matches!(self, UnitError::Sink { .. })
    }
}

/// Failure inside one stage of reading a commit, before the hash is attached.
#[derive(Debug)]
pub(crate) enum StageError {
    Git(git2::Error),
    Sink(SinkError),
    Cancelled,
}

impl StageError {
    pub(crate) fn for_commit(self, hash: &str) -> UnitError {
        let hash = hash.to_string();
        match self {
            StageError::Git(source) => UnitError::Read { hash, source },
            StageError::Sink(source) => UnitError::Sink { hash, source },
            StageError::Cancelled => UnitError::Cancelled { hash },
        }
    }
}

impl From<git2::Error> for StageError {
    fn from(e: git2::Error) -> Self {
        StageError::Git(e)
    }
}

impl From<SinkError> for StageError {
    fn from(e: SinkError) -> Self {
        StageError::Sink(e)
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("rejected: {0}")]
    Rejected(String),
}
