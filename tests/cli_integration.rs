use std::{collections::HashMap, time::Duration as StdDuration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use pr_sentinel::{
    ConsoleSink, CsvSink, Forge, OutputMode, PullRequest, ReportSpec, ReportSummary, Repo,
    Review, ReviewRequest, ReviewState, parse_args, run_report,
};

/// Mock GitHub hub for testing
#[derive(Default)]
pub struct MockHub {
    pub prs: Vec<PullRequest>,
    pub requested: HashMap<u64, Vec<&'static str>>,
    pub reviews: HashMap<u64, Vec<Review>>,
    /// PR whose review listing fails.
    pub failing_pr: Option<u64>,
    /// Artificial per-PR latency, used to shuffle completion order.
    pub latency: HashMap<u64, u64>,
}

#[async_trait]
impl Forge for MockHub {
    async fn search_open_pull_requests(&self, _repo: &Repo, limit: u8) -> Result<Vec<PullRequest>> {
        Ok(self
            .prs
            .iter()
            .take(usize::from(limit))
            .cloned()
            .collect())
    }

    async fn list_requested_reviewers(
        &self,
        _repo: &Repo,
        number: u64,
    ) -> Result<Vec<ReviewRequest>> {
        if let Some(ms) = self.latency.get(&number) {
            tokio::time::sleep(StdDuration::from_millis(*ms)).await;
        }
        Ok(self
            .requested
            .get(&number)
            .into_iter()
            .flatten()
            .map(|login| ReviewRequest {
                reviewer: login.to_string(),
                pr_number: number,
            })
            .collect())
    }

    async fn list_reviews(&self, _repo: &Repo, number: u64) -> Result<Vec<Review>> {
        if self.failing_pr == Some(number) {
            anyhow::bail!("API rate limit exceeded");
        }
        Ok(self.reviews.get(&number).cloned().unwrap_or_default())
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
}

fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

fn test_repo() -> Repo {
    Repo::new("owner", "repo").unwrap()
}

fn pr(number: u64, created_days_ago: i64) -> PullRequest {
    PullRequest {
        number,
        title: format!("Change number {number}"),
        url: format!("https://github.com/owner/repo/pull/{number}"),
        author: Some("octocat".to_string()),
        created_at: days_ago(created_days_ago),
    }
}

fn review(login: &str, state: ReviewState, submitted: Option<DateTime<Utc>>) -> Review {
    Review {
        reviewer: login.to_string(),
        state,
        submitted_at: submitted,
    }
}

/// Helper to create mock GitHub data for testing
///
/// PR 1: alice requested, no review, PR five days old.
/// PR 2: bob has a PENDING review submitted three days ago.
/// PR 3: carol requested on a one day old PR.
/// PR 4: dave approved an old PR, erin still requested.
/// PR 5: frank both requested and holding a stale unsubmitted PENDING review.
fn create_mock_github_data() -> MockHub {
    let mut hub = MockHub {
        prs: vec![pr(1, 5), pr(2, 5), pr(3, 1), pr(4, 10), pr(5, 6)],
        ..Default::default()
    };

    hub.requested.insert(1, vec!["alice"]);
    hub.requested.insert(3, vec!["carol"]);
    hub.requested.insert(4, vec!["dave", "erin"]);
    hub.requested.insert(5, vec!["frank"]);

    hub.reviews.insert(
        2,
        vec![review("bob", ReviewState::Pending, Some(days_ago(3)))],
    );
    hub.reviews.insert(
        4,
        vec![review("dave", ReviewState::Approved, Some(days_ago(9)))],
    );
    hub.reviews.insert(
        5,
        vec![
            review("frank", ReviewState::Pending, None),
            review("frank", ReviewState::Pending, Some(days_ago(4))),
        ],
    );

    hub
}

/// Parses `raw_args`, runs the report against `forge` and returns console
/// output with the summary.
async fn run_sentinel_test<F>(raw_args: Vec<&str>, forge: &F) -> Result<(String, ReportSummary)>
where
    F: Forge + Sync,
{
    let invocation = parse_args(raw_args)?;
    let OutputMode::Console { detailed } = invocation.output else {
        anyhow::bail!("console output expected");
    };

    let spec = ReportSpec {
        repo: invocation.repo.unwrap_or_else(test_repo),
        threshold_days: invocation.threshold_days,
        limit: invocation.limit,
        concurrency: invocation.concurrency,
    };

    let mut sink = ConsoleSink::new(Vec::new(), spec.threshold_days, detailed);
    let summary = run_report(&spec, forge, &mut sink, now()).await?;
    Ok((String::from_utf8(sink.into_inner())?, summary))
}

fn default_spec() -> ReportSpec {
    ReportSpec {
        repo: test_repo(),
        threshold_days: 2,
        limit: 10,
        concurrency: 1,
    }
}

#[tokio::test]
async fn test_console_report_for_mixed_pull_requests() {
    let hub = create_mock_github_data();

    let (output, summary) = run_sentinel_test(vec!["pr-sentinel"], &hub).await.unwrap();

    assert_eq!(
        output,
        "PR #1 - Reviewers delayed (no review or pending review for more than 2 days):\n\
         - alice\n\
         PR #2 - Reviewers delayed (no review or pending review for more than 2 days):\n\
         - bob\n\
         PR #4 - Reviewers delayed (no review or pending review for more than 2 days):\n\
         - erin\n\
         PR #5 - Reviewers delayed (no review or pending review for more than 2 days):\n\
         - frank\n"
    );
    assert_eq!(
        summary,
        ReportSummary {
            prs_scanned: 5,
            prs_with_delays: 4,
            delayed_reviewers: 4,
        }
    );
}

#[tokio::test]
async fn test_recent_pull_request_is_not_reported() {
    let hub = create_mock_github_data();

    let (output, _) = run_sentinel_test(vec!["pr-sentinel"], &hub).await.unwrap();

    assert!(!output.contains("PR #3"));
    assert!(!output.contains("carol"));
}

#[tokio::test]
async fn test_approved_reviewer_is_not_reported() {
    let hub = create_mock_github_data();

    let (output, _) = run_sentinel_test(vec!["pr-sentinel"], &hub).await.unwrap();

    assert!(!output.contains("dave"));
}

#[tokio::test]
async fn test_larger_threshold_reduces_report() {
    let hub = create_mock_github_data();

    let (output, summary) = run_sentinel_test(vec!["pr-sentinel", "--days", "7"], &hub)
        .await
        .unwrap();

    // Only PR 4 (10 days old) predates a seven day threshold.
    assert_eq!(
        output,
        "PR #4 - Reviewers delayed (no review or pending review for more than 7 days):\n\
         - erin\n"
    );
    assert_eq!(summary.prs_with_delays, 1);
}

#[tokio::test]
async fn test_limit_restricts_scanned_pull_requests() {
    let hub = create_mock_github_data();

    let (output, summary) = run_sentinel_test(vec!["pr-sentinel", "-L", "2"], &hub)
        .await
        .unwrap();

    assert_eq!(summary.prs_scanned, 2);
    assert!(output.contains("PR #2"));
    assert!(!output.contains("PR #4"));
}

#[tokio::test]
async fn test_concurrent_fetching_preserves_output() {
    let mut hub = create_mock_github_data();
    // Earlier PRs answer slower so they complete last.
    for (number, ms) in [(1, 40), (2, 30), (3, 20), (4, 10), (5, 0)] {
        hub.latency.insert(number, ms);
    }

    let (sequential, _) = run_sentinel_test(vec!["pr-sentinel"], &hub).await.unwrap();
    let (concurrent, _) = run_sentinel_test(vec!["pr-sentinel", "-j", "5"], &hub)
        .await
        .unwrap();

    assert_eq!(sequential, concurrent);
}

#[tokio::test]
async fn test_detailed_console_output() {
    let hub = create_mock_github_data();

    let (output, _) = run_sentinel_test(vec!["pr-sentinel", "--detailed"], &hub)
        .await
        .unwrap();

    assert!(
        output.contains("Change number 1 (https://github.com/owner/repo/pull/1) by @octocat")
    );
    assert!(output.contains("- alice (no review,"));
    assert!(output.contains("- bob (pending review, since"));
}

#[tokio::test]
async fn test_repo_flag_is_passed_to_forge() {
    struct RepoCheckingHub;

    #[async_trait]
    impl Forge for RepoCheckingHub {
        async fn search_open_pull_requests(
            &self,
            repo: &Repo,
            _limit: u8,
        ) -> Result<Vec<PullRequest>> {
            assert_eq!(repo.to_string(), "acme/rockets");
            Ok(Vec::new())
        }

        async fn list_requested_reviewers(
            &self,
            _repo: &Repo,
            _number: u64,
        ) -> Result<Vec<ReviewRequest>> {
            unreachable!("no pull requests were returned")
        }

        async fn list_reviews(&self, _repo: &Repo, _number: u64) -> Result<Vec<Review>> {
            unreachable!("no pull requests were returned")
        }
    }

    let (output, summary) =
        run_sentinel_test(vec!["pr-sentinel", "--repo", "acme/rockets"], &RepoCheckingHub)
            .await
            .unwrap();

    assert!(output.is_empty());
    assert_eq!(summary, ReportSummary::default());
}

#[tokio::test]
async fn test_csv_export_writes_rows_in_sao_paulo_time() {
    let hub = create_mock_github_data();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pr_reviewers.csv");
    std::fs::write(&path, "stale contents from a previous run\n").unwrap();

    let invocation = parse_args(vec!["pr-sentinel", "--csv", path.to_str().unwrap()]).unwrap();
    let OutputMode::Csv { path, timezone } = invocation.output else {
        panic!("csv output expected");
    };

    let mut sink = CsvSink::create(&path, timezone).unwrap();
    run_report(&default_spec(), &hub, &mut sink, now())
        .await
        .unwrap();
    assert_eq!(sink.rows_written(), 4);
    drop(sink);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        contents,
        "PR Number,Reviewer,Last Review Date\n\
         1,alice,N/A\n\
         2,bob,2024-05-07 09:00:00\n\
         4,erin,N/A\n\
         5,frank,2024-05-04 09:00:00\n"
    );
}

#[tokio::test]
async fn test_failure_mid_run_keeps_earlier_csv_rows() {
    let mut hub = create_mock_github_data();
    hub.failing_pr = Some(4);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.csv");

    let mut sink = CsvSink::create(&path, chrono_tz::UTC).unwrap();
    let err = run_report(&default_spec(), &hub, &mut sink, now())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("rate limit"));
    assert_eq!(sink.rows_written(), 2);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        contents,
        "PR Number,Reviewer,Last Review Date\n\
         1,alice,N/A\n\
         2,bob,2024-05-07 12:00:00\n"
    );
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let hub = create_mock_github_data();

    let (first, _) = run_sentinel_test(vec!["pr-sentinel"], &hub).await.unwrap();
    let (second, _) = run_sentinel_test(vec!["pr-sentinel"], &hub).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_threshold_beyond_date_range_fails_cleanly() {
    let hub = create_mock_github_data();
    let spec = ReportSpec {
        threshold_days: u32::MAX,
        ..default_spec()
    };
    let mut sink = ConsoleSink::new(Vec::new(), spec.threshold_days, false);

    let err = run_report(&spec, &hub, &mut sink, now()).await.unwrap_err();

    assert!(err.to_string().contains("supported date range"));
    assert!(sink.into_inner().is_empty());
}
