// src/main.rs

mod cli;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use cli::Args;
use git_miner::{JsonLinesSink, RepositorySource, Sink, SinkPolicy, TimeRange, WalkOptions};
use indicatif::ProgressBar;
use std::fs::File;
use std::io::{self, BufWriter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    // Logs go to stderr so stdout stays clean for the record stream
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .try_init()
            .ok();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json, args.log_level);

    let mut source = RepositorySource::open(&args.repo)?;
    if let Some(name) = &args.name {
        source = source.with_name(name);
    }
    if let Some(url) = &args.url {
        source = source.with_url(url);
    }

    let sink: Option<Arc<dyn Sink>> = match (&args.output, args.no_sink) {
        (_, true) => None,
        (Some(path), false) => {
            let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
            let sink: Arc<dyn Sink> = Arc::new(JsonLinesSink::new(BufWriter::new(file)));
            Some(sink)
        }
        (None, false) => {
            let sink: Arc<dyn Sink> = Arc::new(JsonLinesSink::new(io::stdout()));
            Some(sink)
        }
    };

    let mut options = WalkOptions {
        timeout: args.timeout_secs.map(Duration::from_secs),
        emit_summary: !args.skip_summary,
        sink_policy: if args.sink_mandatory {
            SinkPolicy::Mandatory
        } else {
            SinkPolicy::BestEffort
        },
        progress: ProgressBar::new(0),
        ..WalkOptions::default()
    };
    if let Some(threads) = args.threads {
        options.threads = threads;
    }
    if args.since.is_some() || args.until.is_some() {
        let since = args.since.unwrap_or(DateTime::<Utc>::MIN_UTC);
        let until = args.until.unwrap_or(DateTime::<Utc>::MAX_UTC);
        options.range = Some(TimeRange::new(since, until)?);
    }

    let outcome = git_miner::walk(&source, sink, &options)?;

    if outcome.incomplete {
        warn!(abandoned = outcome.abandoned, "run is incomplete");
    }
    for failure in &outcome.failures {
        warn!(hash = %failure.hash(), error = %failure, "commit not mined");
    }

    if let Some(path) = &args.report {
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &outcome.run)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
    }

    info!(
        commits = outcome.run.commits.len(),
        users = outcome.run.users.len(),
        tags = outcome.run.tags.len(),
        failures = outcome.failures.len(),
        "done"
    );
    Ok(())
}
