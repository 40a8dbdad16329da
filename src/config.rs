//! Startup configuration sourced from the environment.
//!
//! Values may come from the process environment or a `.env` file; the
//! process environment always takes precedence. Validation happens before
//! any network access so a misconfigured run fails fast.

use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::types::{Repo, RepoError};

pub const TOKEN_VAR: &str = "GITHUB_TOKEN";
pub const TOKEN_FALLBACK_VAR: &str = "GH_TOKEN";
pub const OWNER_VAR: &str = "REPO_OWNER";
pub const NAME_VAR: &str = "REPO_NAME";
pub const API_URL_VAR: &str = "GITHUB_API_URL";

/// Identifier sent as the `User-Agent` of every API request.
pub const USER_AGENT: &str = concat!("pr-sentinel/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "missing required configuration: {}; define them in the environment or a .env file",
        .0.join(", ")
    )]
    MissingVariables(Vec<&'static str>),
    #[error("invalid repository from {source_name}: {error}")]
    InvalidRepo {
        source_name: &'static str,
        #[source]
        error: RepoError,
    },
    #[error("invalid GITHUB_API_URL '{value}': {error}")]
    InvalidApiUrl {
        value: String,
        #[source]
        error: url::ParseError,
    },
    #[error("failed to load env file '{path}': {error}")]
    EnvFile {
        path: String,
        #[source]
        error: dotenvy::Error,
    },
}

/// Validated settings needed to talk to GitHub.
#[derive(Clone)]
pub struct Config {
    pub token: String,
    pub repo: Repo,
    pub api_url: Option<Url>,
}

// Keep the token out of debug logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("repo", &self.repo)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Treats an absent implicit `.env` as nothing to load; anything else that
/// goes wrong reading or parsing it is an error.
fn optional_env_file(
    loaded: Result<PathBuf, dotenvy::Error>,
) -> Result<Option<PathBuf>, ConfigError> {
    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(error) if error.not_found() => Ok(None),
        Err(error) => Err(ConfigError::EnvFile {
            path: ".env".to_string(),
            error,
        }),
    }
}

impl Config {
    /// Loads the optional env file, then validates the process environment.
    ///
    /// An explicit `env_file` must exist; the implicit `./.env` is optional.
    pub fn from_env(
        repo_override: Option<Repo>,
        env_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|error| ConfigError::EnvFile {
                    path: path.display().to_string(),
                    error,
                })?;
                debug!("Loaded environment from {}", path.display());
            }
            None => {
                if let Some(path) = optional_env_file(dotenvy::dotenv())? {
                    debug!("Loaded environment from {}", path.display());
                }
            }
        }

        Self::from_lookup(repo_override, |key| std::env::var(key).ok())
    }

    /// Validates configuration using `lookup` to resolve variable names.
    ///
    /// Every missing variable is reported at once. Blank values count as
    /// missing.
    pub fn from_lookup<F>(repo_override: Option<Repo>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let token = get(TOKEN_VAR).or_else(|| get(TOKEN_FALLBACK_VAR));
        let (owner, name) = if repo_override.is_some() {
            (None, None)
        } else {
            (get(OWNER_VAR), get(NAME_VAR))
        };

        let mut missing = Vec::new();
        if token.is_none() {
            missing.push(TOKEN_VAR);
        }
        if repo_override.is_none() {
            if owner.is_none() {
                missing.push(OWNER_VAR);
            }
            if name.is_none() {
                missing.push(NAME_VAR);
            }
        }

        let Some(token) = token.filter(|_| missing.is_empty()) else {
            return Err(ConfigError::MissingVariables(missing));
        };

        let repo = match (repo_override, owner, name) {
            (Some(repo), _, _) => repo,
            (None, Some(owner), Some(name)) => {
                Repo::new(owner, name).map_err(|error| ConfigError::InvalidRepo {
                    source_name: "REPO_OWNER/REPO_NAME",
                    error,
                })?
            }
            _ => return Err(ConfigError::MissingVariables(missing)),
        };

        let api_url = get(API_URL_VAR)
            .map(|value| {
                Url::parse(&value).map_err(|error| ConfigError::InvalidApiUrl { value, error })
            })
            .transpose()?;

        Ok(Self {
            token,
            repo,
            api_url,
        })
    }
}
