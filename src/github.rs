use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::{HeaderValue, Uri};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use octocrab::{
    AuthState, Octocrab, OctocrabBuilder,
    service::middleware::{
        auth_header::AuthHeaderLayer, base_uri::BaseUriLayer, extra_headers::ExtraHeadersLayer,
    },
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    config::{Config, USER_AGENT},
    types::{Forge, PullRequest, Repo, Review, ReviewRequest, ReviewState},
};

/// GitHub REST client backed by octocrab.
#[derive(Clone)]
pub struct GitHub {
    octocrab: Octocrab,
}

const GITHUB_API_URI: &str = "https://api.github.com";
const GITHUB_UPLOAD_URI: &str = "https://uploads.github.com";

/// Creates an authenticated GitHub client for the configured API.
///
/// The service stack is assembled here rather than by octocrab's default
/// builder, which always sends its own `User-Agent` alongside any extra one.
pub fn setup_github_client(config: &Config) -> Result<Octocrab> {
    let base_uri = match &config.api_url {
        Some(api_url) => api_url
            .as_str()
            .trim_end_matches('/')
            .parse::<Uri>()
            .with_context(|| format!("Invalid GitHub API URL: '{}'", api_url))?,
        None => Uri::from_static(GITHUB_API_URI),
    };

    let mut authorization = HeaderValue::try_from(format!("Bearer {}", config.token))
        .context("GitHub token is not a valid header value")?;
    authorization.set_sensitive(true);

    let connector = HttpsConnectorBuilder::new()
        .with_native_roots()
        .context("Failed to load native TLS root certificates")?
        .https_or_http()
        .enable_http1()
        .build();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let headers = vec![(
        http::header::USER_AGENT,
        HeaderValue::from_static(USER_AGENT),
    )];

    OctocrabBuilder::new_empty()
        .with_service(client)
        .with_layer(&ExtraHeadersLayer::new(Arc::new(headers)))
        .with_layer(&BaseUriLayer::new(base_uri.clone()))
        .with_layer(&AuthHeaderLayer::new(
            Some(authorization),
            base_uri,
            Uri::from_static(GITHUB_UPLOAD_URI),
        ))
        .with_auth(AuthState::None)
        .build()
        .context("Failed to create GitHub client")
}

impl GitHub {
    pub fn new(octocrab: Octocrab) -> Self {
        Self { octocrab }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        setup_github_client(config).map(Self::new)
    }
}

/// Builds the search query for open pull requests in `repo`.
pub fn open_pull_requests_query(repo: &Repo) -> String {
    format!("repo:{} state:open is:pr is:open", repo)
}

#[derive(Debug, Serialize)]
struct SearchParams<'a> {
    q: &'a str,
    per_page: u8,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    number: u64,
    title: String,
    html_url: String,
    user: Option<Account>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Account {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RequestedReviewersResponse {
    users: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct ReviewItem {
    // Null when the reviewing account has been deleted.
    user: Option<Account>,
    state: ReviewState,
    submitted_at: Option<DateTime<Utc>>,
}

impl From<SearchItem> for PullRequest {
    fn from(item: SearchItem) -> Self {
        PullRequest {
            number: item.number,
            title: item.title,
            url: item.html_url,
            author: item.user.map(|u| u.login),
            created_at: item.created_at,
        }
    }
}

fn pulls_route(repo: &Repo, number: u64, tail: &str) -> String {
    format!(
        "/repos/{}/{}/pulls/{}/{}",
        repo.owner(),
        repo.name(),
        number,
        tail
    )
}

#[async_trait]
impl Forge for GitHub {
    async fn search_open_pull_requests(&self, repo: &Repo, limit: u8) -> Result<Vec<PullRequest>> {
        let query = open_pull_requests_query(repo);
        debug!("Searching pull requests: {}", query);

        let response: SearchResponse = self
            .octocrab
            .get(
                "/search/issues",
                Some(&SearchParams {
                    q: &query,
                    per_page: limit,
                }),
            )
            .await
            .with_context(|| format!("Failed to search open pull requests in {}", repo))?;

        Ok(response
            .items
            .into_iter()
            .take(usize::from(limit))
            .map(PullRequest::from)
            .collect())
    }

    async fn list_requested_reviewers(
        &self,
        repo: &Repo,
        number: u64,
    ) -> Result<Vec<ReviewRequest>> {
        let response: RequestedReviewersResponse = self
            .octocrab
            .get(pulls_route(repo, number, "requested_reviewers"), None::<&()>)
            .await
            .with_context(|| format!("Failed to list requested reviewers for PR #{}", number))?;

        Ok(response
            .users
            .into_iter()
            .map(|user| ReviewRequest {
                reviewer: user.login,
                pr_number: number,
            })
            .collect())
    }

    async fn list_reviews(&self, repo: &Repo, number: u64) -> Result<Vec<Review>> {
        let items: Vec<ReviewItem> = self
            .octocrab
            .get(pulls_route(repo, number, "reviews"), None::<&()>)
            .await
            .with_context(|| format!("Failed to list reviews for PR #{}", number))?;

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let Some(user) = item.user else {
                    warn!("Skipping review without an author on PR #{}", number);
                    return None;
                };
                debug!("PR #{}: {} review by {}", number, item.state, user.login);
                Some(Review {
                    reviewer: user.login,
                    state: item.state,
                    submitted_at: item.submitted_at,
                })
            })
            .collect())
    }
}
