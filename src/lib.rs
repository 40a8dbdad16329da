//! pr-sentinel: find open pull requests whose reviewers have gone quiet.
//!
//! Searches a repository's open pull requests, compares each requested
//! reviewer's activity against a threshold date, and reports the reviewers
//! who have not responded in time to the console or a CSV file.

pub mod cli;
pub mod config;
pub mod detector;
pub mod github;
pub mod report;
pub mod sink;
pub mod types;

pub use cli::{Invocation, OutputMode, parse_args};
pub use config::{Config, ConfigError};
pub use detector::{ThresholdOutOfRange, find_delayed_reviewers, threshold_date};
pub use github::GitHub;
pub use report::{ReportSpec, ReportSummary, run_report};
pub use sink::{ConsoleSink, CsvSink, ReportSink};
pub use types::{
    DelayReason, DelayedReviewer, Forge, LastReview, PrReport, PullRequest, Repo, RepoError,
    Review, ReviewRequest, ReviewState,
};
