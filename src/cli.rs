// src/cli.rs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the git repository to mine
    #[arg(short, long, env = "GIT_MINER_REPO")]
    pub repo: PathBuf,

    /// Name the repository is reported under (defaults to its directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// URL the repository is reported under (defaults to the origin remote)
    #[arg(long)]
    pub url: Option<String>,

    /// Number of worker threads (defaults to available parallelism)
    #[arg(short, long, env = "GIT_MINER_THREADS")]
    pub threads: Option<usize>,

    /// Give up on outstanding commits after this many seconds
    #[arg(long, env = "GIT_MINER_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Only commits at or after this time (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_since)]
    pub since: Option<DateTime<Utc>>,

    /// Only commits at or before this time (RFC 3339 or YYYY-MM-DD, end of day)
    #[arg(long, value_parser = parse_until)]
    pub until: Option<DateTime<Utc>>,

    /// JSON-lines file receiving every record; stdout if omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not stream records at all
    #[arg(long, conflicts_with = "output")]
    pub no_sink: bool,

    /// Do not send the repository summary before walking
    #[arg(long)]
    pub skip_summary: bool,

    /// Abort the walk on the first record the sink rejects
    #[arg(long)]
    pub sink_mandatory: bool,

    /// Write the final mining run as pretty JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info", env = "GIT_MINER_LOG_LEVEL")]
    pub log_level: tracing::Level,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

fn parse_time(s: &str, day_time: NaiveTime) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(day_time).and_utc())
        .map_err(|_| format!("expected RFC 3339 or YYYY-MM-DD, got `{s}`"))
}

fn parse_since(s: &str) -> Result<DateTime<Utc>, String> {
    parse_time(s, NaiveTime::MIN)
}

fn parse_until(s: &str) -> Result<DateTime<Utc>, String> {
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    parse_time(s, end_of_day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_expand_to_whole_days() {
        assert_eq!(parse_since("2024-03-01").unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(parse_until("2024-03-01").unwrap().to_rfc3339(), "2024-03-01T23:59:59+00:00");
    }

    #[test]
    fn rfc3339_is_converted_to_utc() {
        let t = parse_since("2024-03-01T10:00:00+02:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-03-01T08:00:00+00:00");
        assert!(parse_since("yesterday").is_err());
    }

    #[test]
    fn args_parse() {
        let args = Args::try_parse_from(["git-miner", "--repo", ".", "--threads", "4", "--no-sink"]).unwrap();
        assert_eq!(args.threads, Some(4));
        assert!(args.no_sink);
        assert_eq!(args.log_level, tracing::Level::INFO);
    }
}
