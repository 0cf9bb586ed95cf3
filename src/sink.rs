// src/sink.rs

use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;

use crate::error::SinkError;
use crate::model::{CommitRecord, RepositorySummary, TagRecord, UserRecord};

/// Downstream consumer of mined records. Called from worker threads.
pub trait Sink: Send + Sync {
    fn persist_repository(&self, summary: &RepositorySummary) -> Result<(), SinkError>;
    fn persist_commit(&self, commit: &CommitRecord) -> Result<(), SinkError>;
    fn persist_tag(&self, tag: &TagRecord) -> Result<(), SinkError>;
    fn persist_user(&self, user: &UserRecord) -> Result<(), SinkError>;
}

/// What a sink failure means for the walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkPolicy {
    /// The failing commit unit is reported and the walk continues
    #[default]
    BestEffort,
    /// The first failure aborts the walk
    Mandatory,
}

#[derive(Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "lowercase")]
enum Line<'a> {
    Repository(&'a RepositorySummary),
    Commit(&'a CommitRecord),
    Tag(&'a TagRecord),
    User(&'a UserRecord),
}

/// Writes every record as one JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        JsonLinesSink {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self, line: Line<'_>) -> Result<(), SinkError> {
        let mut buf = serde_json::to_vec(&line)?;
        buf.push(b'\n');
        let mut out = self
            .out
            .lock()
            .map_err(|_| SinkError::Rejected("output writer poisoned".to_string()))?;
        out.write_all(&buf)?;
        out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Sink for JsonLinesSink<W> {
    fn persist_repository(&self, summary: &RepositorySummary) -> Result<(), SinkError> {
        self.write(Line::Repository(summary))
    }

    fn persist_commit(&self, commit: &CommitRecord) -> Result<(), SinkError> {
        self.write(Line::Commit(commit))
    }

    fn persist_tag(&self, tag: &TagRecord) -> Result<(), SinkError> {
        self.write(Line::Tag(tag))
    }

    fn persist_user(&self, user: &UserRecord) -> Result<(), SinkError> {
        self.write(Line::User(user))
    }
}
