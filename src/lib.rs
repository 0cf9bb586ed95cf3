//! Extracts commits, diffs, tags and authors from a local git repository.
//!
//! [`walk`] enumerates every reachable commit, reads each one on a bounded
//! worker pool and accumulates the results into a [`MiningRun`]. Records can
//! be streamed to a [`Sink`] as they complete.

pub mod diff;
pub mod error;
pub mod identity;
pub mod model;
pub mod reader;
pub mod run;
pub mod sink;
pub mod tags;
pub mod walker;

pub use error::{MineError, SinkError, UnitError};
pub use model::{
    ChangeKind, CommitRecord, FileChangeRecord, MetadataRecord, MiningRun, RepositorySummary,
    TagRecord, TimeRange, UserRecord,
};
pub use reader::{MetadataExtractor, NoMetadata};
pub use sink::{JsonLinesSink, Sink, SinkPolicy};
pub use walker::{walk, walk_with_metadata, RepositorySource, WalkOptions, WalkOutcome};
