//! Delayed reviewer detection.
//!
//! Pure computation over one pull request snapshot: no I/O, no clock access.
//! Callers supply the threshold date so the same input always yields the
//! same output.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::types::{
    DelayReason, DelayedReviewer, LastReview, PullRequest, Review, ReviewRequest, ReviewState,
};

/// Default number of days a reviewer may stay silent before being reported.
pub const DEFAULT_THRESHOLD_DAYS: u32 = 2;

/// Largest threshold accepted on the command line (about a century).
pub const MAX_THRESHOLD_DAYS: u32 = 36_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a threshold of {0} days reaches past the supported date range")]
pub struct ThresholdOutOfRange(pub u32);

/// Returns the cutoff before which inaction counts as delayed.
pub fn threshold_date(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>, ThresholdOutOfRange> {
    Duration::try_days(i64::from(days))
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or(ThresholdOutOfRange(days))
}

/// Finds the reviewers on `pr` who have not acted before `threshold`.
///
/// A requested reviewer with no review record of any state is delayed when
/// the pull request itself predates the threshold. A `PENDING` review is
/// delayed when its submission time, or the pull request creation time if it
/// was never submitted, predates the threshold.
///
/// Each login appears at most once; the first match wins, requested
/// reviewers before pending reviews.
pub fn find_delayed_reviewers(
    pr: &PullRequest,
    requested: &[ReviewRequest],
    reviews: &[Review],
    threshold: DateTime<Utc>,
) -> Vec<DelayedReviewer> {
    let reviewed: HashSet<&str> = reviews.iter().map(|r| r.reviewer.as_str()).collect();
    let pr_is_stale = pr.created_at < threshold;

    let awaiting = requested
        .iter()
        .filter(|request| pr_is_stale && !reviewed.contains(request.reviewer.as_str()))
        .map(|request| DelayedReviewer {
            reviewer: request.reviewer.clone(),
            pr_number: pr.number,
            last_review: LastReview::NotAvailable,
            reason: DelayReason::AwaitingReview,
        });

    let pending = reviews
        .iter()
        .filter(|review| review.state == ReviewState::Pending)
        .filter_map(|review| {
            let effective = review.submitted_at.unwrap_or(pr.created_at);
            (effective < threshold).then(|| DelayedReviewer {
                reviewer: review.reviewer.clone(),
                pr_number: pr.number,
                last_review: LastReview::At(effective),
                reason: DelayReason::StalePendingReview,
            })
        });

    let mut seen = HashSet::new();
    awaiting
        .chain(pending)
        .filter(|delayed| seen.insert(delayed.reviewer.clone()))
        .collect()
}
