use std::pin::pin;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info};

use crate::{
    detector::{find_delayed_reviewers, threshold_date},
    sink::ReportSink,
    types::{Forge, PrReport, PullRequest, Repo, Review, ReviewRequest},
};

/// Default number of pull requests inspected per run.
pub const DEFAULT_LIMIT: u8 = 10;

/// What to scan and how.
#[derive(Debug, Clone)]
pub struct ReportSpec {
    pub repo: Repo,
    pub threshold_days: u32,
    /// Maximum pull requests taken from the first search page.
    pub limit: u8,
    /// Pull requests fetched at once; 1 means strictly sequential.
    pub concurrency: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub prs_scanned: usize,
    pub prs_with_delays: usize,
    pub delayed_reviewers: usize,
}

/// One pull request with everything the detector needs.
struct Snapshot {
    pr: PullRequest,
    requested: Vec<ReviewRequest>,
    reviews: Vec<Review>,
}

async fn fetch_snapshot<F>(forge: &F, repo: &Repo, pr: PullRequest) -> Result<Snapshot>
where
    F: Forge + Sync,
{
    debug!("Fetching reviewers for PR #{}", pr.number);
    let requested = forge.list_requested_reviewers(repo, pr.number).await?;
    let reviews = forge.list_reviews(repo, pr.number).await?;
    debug!(
        "PR #{}: {} requested reviewer(s), {} review(s)",
        pr.number,
        requested.len(),
        reviews.len()
    );

    Ok(Snapshot {
        pr,
        requested,
        reviews,
    })
}

/// Scans open pull requests and reports delayed reviewers to `sink`.
///
/// Each pull request's report reaches the sink as soon as it is computed, in
/// search order, regardless of `spec.concurrency`. The first fetch or sink
/// error aborts the run; reports already delivered stay delivered.
pub async fn run_report<F, S>(
    spec: &ReportSpec,
    forge: &F,
    sink: &mut S,
    now: DateTime<Utc>,
) -> Result<ReportSummary>
where
    F: Forge + Sync,
    S: ReportSink + ?Sized,
{
    let threshold = threshold_date(now, spec.threshold_days)?;
    let prs = forge
        .search_open_pull_requests(&spec.repo, spec.limit)
        .await?;
    info!(
        "Found {} open pull request(s) in {}; threshold {}",
        prs.len(),
        spec.repo,
        threshold
    );

    let mut summary = ReportSummary::default();
    let mut snapshots = pin!(
        stream::iter(prs)
            .map(|pr| fetch_snapshot(forge, &spec.repo, pr))
            .buffered(spec.concurrency.max(1))
    );

    while let Some(snapshot) = snapshots.try_next().await? {
        let delayed = find_delayed_reviewers(
            &snapshot.pr,
            &snapshot.requested,
            &snapshot.reviews,
            threshold,
        );
        let report = PrReport {
            pr: snapshot.pr,
            delayed,
        };

        summary.prs_scanned += 1;
        if report.has_delays() {
            summary.prs_with_delays += 1;
            summary.delayed_reviewers += report.delayed.len();
        }

        sink.record(&report)?;
    }

    sink.finish()?;
    info!(
        "Scanned {} pull request(s): {} delayed reviewer(s) across {} pull request(s)",
        summary.prs_scanned, summary.delayed_reviewers, summary.prs_with_delays
    );

    Ok(summary)
}
