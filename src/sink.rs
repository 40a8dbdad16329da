//! Destinations for per pull request results.

use std::{fs::File, io::Write, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;
use chrono_tz::Tz;

use crate::types::{LastReview, PrReport};

/// Default CSV export path, relative to the working directory.
pub const DEFAULT_CSV_PATH: &str = "pr_reviewers.csv";

/// Timezone used for CSV timestamps unless overridden.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Sao_Paulo;

pub const CSV_HEADERS: [&str; 3] = ["PR Number", "Reviewer", "Last Review Date"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Receives each pull request's report as soon as it is computed.
pub trait ReportSink {
    fn record(&mut self, report: &PrReport) -> Result<()>;

    /// Flushes anything buffered. Called once after the last report.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Formats `last_review` for export, converting to `timezone`.
pub fn format_last_review(last_review: &LastReview, timezone: &Tz) -> String {
    last_review.timestamp().map_or_else(
        || LastReview::NOT_AVAILABLE.to_string(),
        |ts| format_timestamp(ts, timezone),
    )
}

pub fn format_timestamp(ts: DateTime<Utc>, timezone: &Tz) -> String {
    ts.with_timezone(timezone).format(TIMESTAMP_FORMAT).to_string()
}

/// Writes a header line per pull request followed by one line per delayed
/// reviewer. Pull requests without delays print nothing.
pub struct ConsoleSink<W: Write> {
    writer: W,
    threshold_days: u32,
    detailed: bool,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(writer: W, threshold_days: u32, detailed: bool) -> Self {
        Self {
            writer,
            threshold_days,
            detailed,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for ConsoleSink<W> {
    fn record(&mut self, report: &PrReport) -> Result<()> {
        if !report.has_delays() {
            return Ok(());
        }

        writeln!(
            self.writer,
            "PR #{} - Reviewers delayed (no review or pending review for more than {} days):",
            report.pr.number, self.threshold_days
        )?;

        if self.detailed {
            let author = report.pr.author.as_deref().unwrap_or("ghost");
            writeln!(
                self.writer,
                "  {} ({}) by @{}",
                report.pr.title, report.pr.url, author
            )?;
        }

        for delayed in &report.delayed {
            if self.detailed {
                let since = match delayed.last_review {
                    LastReview::NotAvailable => format!(
                        "requested on a PR opened {}",
                        HumanTime::from(report.pr.created_at)
                    ),
                    LastReview::At(ts) => format!("since {}", HumanTime::from(ts)),
                };
                writeln!(
                    self.writer,
                    "- {} ({}, {})",
                    delayed.reviewer,
                    delayed.reason.describe(),
                    since
                )?;
            } else {
                writeln!(self.writer, "- {}", delayed.reviewer)?;
            }
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Appends one CSV row per delayed reviewer.
///
/// Rows are flushed after every pull request so results already written
/// survive a failure later in the run.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    timezone: Tz,
    rows_written: usize,
}

impl CsvSink<File> {
    /// Creates (or truncates) the file at `path` and writes the header row.
    pub fn create(path: &Path, timezone: Tz) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV file '{}'", path.display()))?;
        Self::new(file, timezone)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W, timezone: Tz) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(writer);
        writer
            .write_record(CSV_HEADERS)
            .context("Failed to write CSV header")?;
        writer.flush()?;

        Ok(Self {
            writer,
            timezone,
            rows_written: 0,
        })
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}

impl<W: Write> ReportSink for CsvSink<W> {
    fn record(&mut self, report: &PrReport) -> Result<()> {
        for delayed in &report.delayed {
            self.writer
                .write_record([
                    delayed.pr_number.to_string(),
                    delayed.reviewer.clone(),
                    format_last_review(&delayed.last_review, &self.timezone),
                ])
                .with_context(|| format!("Failed to write CSV row for PR #{}", delayed.pr_number))?;
            self.rows_written += 1;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
