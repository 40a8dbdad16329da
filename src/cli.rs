use std::path::PathBuf;

use anyhow::Result;
use chrono_tz::Tz;
use clap::{Args, Parser};

use crate::{
    detector::{DEFAULT_THRESHOLD_DAYS, MAX_THRESHOLD_DAYS},
    report::DEFAULT_LIMIT,
    sink::{DEFAULT_CSV_PATH, DEFAULT_TIMEZONE},
    types::Repo,
};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

/// Where results go.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputMode {
    Console { detailed: bool },
    Csv { path: PathBuf, timezone: Tz },
}

/// Parsed command line, before configuration is resolved from the
/// environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Overrides `REPO_OWNER`/`REPO_NAME` when present.
    pub repo: Option<Repo>,
    pub threshold_days: u32,
    pub limit: u8,
    pub concurrency: usize,
    pub output: OutputMode,
    pub env_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
struct OutputArgs {
    /// Export to CSV instead of printing (PATH defaults to pr_reviewers.csv)
    #[arg(
        long,
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = DEFAULT_CSV_PATH,
        help_heading = "Output"
    )]
    pub csv: Option<PathBuf>,

    /// IANA timezone for CSV timestamps
    #[arg(
        long,
        value_name = "TZ",
        requires = "csv",
        value_parser = parse_timezone,
        help_heading = "Output"
    )]
    pub timezone: Option<Tz>,

    /// Show PR titles and how long each reviewer has been waited on
    #[arg(short = 'd', long, conflicts_with = "csv", help_heading = "Output")]
    pub detailed: bool,
}

#[derive(Parser, Debug, Default)]
#[command(
    name = "pr-sentinel",
    about = "Report open pull requests whose requested reviewers have not responded in time"
)]
#[command(version, long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    /// GitHub repository in format 'owner/repo' (overrides REPO_OWNER and REPO_NAME)
    #[arg(short = 'r', long, value_name = "OWNER/REPO", value_parser = parse_repo)]
    pub repo: Option<Repo>,

    /// Days a reviewer may stay silent before being reported
    #[arg(
        long,
        value_name = "DAYS",
        default_value_t = DEFAULT_THRESHOLD_DAYS,
        value_parser = clap::value_parser!(u32).range(..=i64::from(MAX_THRESHOLD_DAYS))
    )]
    pub days: u32,

    /// Number of open PRs to inspect (first page only)
    #[arg(
        short = 'L',
        long,
        value_name = "NUM",
        default_value_t = DEFAULT_LIMIT,
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    pub limit: u8,

    /// Number of PRs to fetch at once
    #[arg(
        short = 'j',
        long,
        value_name = "NUM",
        default_value_t = 1,
        value_parser = clap::value_parser!(u16).range(1..=16)
    )]
    pub concurrency: u16,

    /// Load environment variables from this file instead of ./.env
    #[arg(long = "env-file", value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,
}

fn parse_repo(value: &str) -> Result<Repo, String> {
    Repo::parse(value).map_err(|e| e.to_string())
}

fn parse_timezone(value: &str) -> Result<Tz, String> {
    value
        .parse::<Tz>()
        .map_err(|_| format!("unknown timezone '{}'", value))
}

fn determine_output_mode(output: OutputArgs) -> OutputMode {
    match output.csv {
        Some(path) => OutputMode::Csv {
            path,
            timezone: output.timezone.unwrap_or(DEFAULT_TIMEZONE),
        },
        None => OutputMode::Console {
            detailed: output.detailed,
        },
    }
}

fn build_invocation(cli: CliArgs) -> Invocation {
    Invocation {
        repo: cli.repo,
        threshold_days: cli.days,
        limit: cli.limit,
        concurrency: usize::from(cli.concurrency),
        output: determine_output_mode(cli.output),
        env_file: cli.env_file,
    }
}

/// Parses command-line arguments into an [`Invocation`].
///
/// Errors from clap, including `--help` and `--version` requests, are
/// returned wrapped in `anyhow` so the caller can inspect their kind.
pub fn parse_args<I, T>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    Ok(build_invocation(cli))
}
