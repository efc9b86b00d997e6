//! GitHub REST API repository summary.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{parse_json, AdapterKind};
use crate::error::{classify, ErrorKind, IntegrationError};
use crate::models::{
    CommandOutcome, CommandRequest, DomainSnapshot, RepositorySnapshot, RepositorySummary,
};
use crate::traits::{Credentials, HttpClient, Integration, SessionToken, Target};

const DEFAULT_API: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const TOP_REPOSITORIES: usize = 5;
/// Widget option naming the account to summarize; defaults to the token owner.
const USER_OPTION: &str = "user";

#[derive(Debug, Deserialize)]
struct Repo {
    full_name: String,
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    // Includes pull requests.
    #[serde(default)]
    open_issues_count: u64,
    #[serde(default)]
    fork: bool,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

#[derive(Debug, Deserialize)]
struct SearchCount {
    total_count: u64,
}

pub struct GithubIntegration {
    http: Arc<dyn HttpClient>,
}

impl GithubIntegration {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// `api.github.com` unless the widget points at a GitHub Enterprise host.
    fn api_base(target: &Target) -> String {
        if target.host.is_empty() || target.bare_host() == "github.com" {
            DEFAULT_API.to_string()
        } else {
            target.url("/api/v3")
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        token: &SessionToken,
    ) -> Result<T, IntegrationError> {
        parse_json(self.http.get(url, token.headers()).await?)
    }

    async fn search_count(
        &self,
        api: &str,
        token: &SessionToken,
        query: &str,
    ) -> Result<u64, IntegrationError> {
        let url = format!("{}/search/issues?q={}&per_page=1", api, urlencoding::encode(query));
        let result: SearchCount = self.get(&url, token).await?;
        Ok(result.total_count)
    }
}

#[async_trait]
impl Integration for GithubIntegration {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Github
    }

    fn supported_commands(&self) -> &'static [&'static str] {
        &[]
    }

    async fn login(
        &self,
        target: &Target,
        credentials: &Credentials,
    ) -> Result<SessionToken, IntegrationError> {
        let mut token = SessionToken::empty()
            .with_header("Accept", "application/vnd.github+json")
            .with_header("User-Agent", "deckhand")
            .with_header("X-GitHub-Api-Version", API_VERSION);

        match (credentials.secret("apiToken"), target.option_str(USER_OPTION)) {
            (None, None) => {
                return Err(IntegrationError::validation(
                    "GitHub needs an API token or a username",
                ))
            }
            (Some(api_token), _) => {
                token = token.with_header("Authorization", format!("Bearer {}", api_token));
            }
            (None, Some(_)) => {}
        }
        Ok(token)
    }

    async fn poll(
        &self,
        target: &Target,
        token: &SessionToken,
    ) -> Result<DomainSnapshot, IntegrationError> {
        let api = Self::api_base(target);
        let username = target.option_str(USER_OPTION).map(str::to_string);
        let authenticated = token.header("Authorization").is_some();

        let (repos_url, login) = match (username, authenticated) {
            (Some(user), _) => (
                format!("{}/users/{}/repos?per_page=100&type=owner", api, urlencoding::encode(&user)),
                user,
            ),
            (None, true) => {
                let user: User = self.get(&format!("{}/user", api), token).await?;
                (
                    format!("{}/user/repos?per_page=100&affiliation=owner", api),
                    user.login,
                )
            }
            (None, false) => {
                return Err(IntegrationError::validation(
                    "GitHub needs an API token or a username",
                ))
            }
        };

        let mut repos: Vec<Repo> = self.get(&repos_url, token).await?;
        repos.retain(|repo| !repo.fork);

        let open_issues = self
            .search_count(&api, token, &format!("user:{} is:issue is:open", login))
            .await?;
        let open_pull_requests = self
            .search_count(&api, token, &format!("user:{} is:pr is:open", login))
            .await?;

        repos.sort_by(|a, b| {
            b.stargazers_count
                .cmp(&a.stargazers_count)
                .then_with(|| a.full_name.cmp(&b.full_name))
        });

        Ok(DomainSnapshot::Repositories(RepositorySnapshot {
            repositories: repos.len(),
            stars: repos.iter().map(|r| r.stargazers_count).sum(),
            forks: repos.iter().map(|r| r.forks_count).sum(),
            open_issues,
            open_pull_requests,
            top: repos
                .into_iter()
                .take(TOP_REPOSITORIES)
                .map(|repo| RepositorySummary {
                    full_name: repo.full_name,
                    stars: repo.stargazers_count,
                    forks: repo.forks_count,
                    open_issues: repo.open_issues_count,
                    url: repo.html_url,
                })
                .collect(),
        }))
    }

    async fn command(
        &self,
        _target: &Target,
        _token: &SessionToken,
        request: &CommandRequest,
    ) -> Result<CommandOutcome, IntegrationError> {
        self.check_command(request)?;
        Err(IntegrationError::UnsupportedCommand {
            command: request.name.clone(),
        })
    }

    fn classify(&self, err: &IntegrationError) -> ErrorKind {
        match err.http_status() {
            // A static token does not expire on its own.
            Some(401) => ErrorKind::AuthInvalid,
            _ => classify(err),
        }
    }
}
