//! Provider clients for pull-request delivery, with enum dispatch.
//!
//! One open PR per docs branch: if a PR for the branch already exists its
//! body is updated to the latest summary. The summary is never additionally
//! posted as a comment.

use crate::errors::{DeliveryError, ProviderError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    GitHub,
    GitLab,
}

impl ProviderKind {
    pub fn default_api_base(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "https://api.github.com",
            ProviderKind::GitLab => "https://gitlab.com/api/v4",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Ok(ProviderKind::GitHub),
            "gitlab" => Ok(ProviderKind::GitLab),
            other => Err(DeliveryError::Validation(format!(
                "unsupported provider '{other}', expected github or gitlab"
            ))),
        }
    }
}

/// Runtime configuration for a provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_api: String,
    pub token: String,
}

/// Result of an ensure-PR call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: String,
    /// False when an existing PR was updated instead of created.
    pub created: bool,
}

/// Concrete provider client with enum dispatch.
#[derive(Debug, Clone)]
pub enum ProviderClient {
    GitHub(GitHubClient),
    GitLab(GitLabClient),
}

impl ProviderClient {
    pub fn from_config(cfg: ProviderConfig) -> Result<Self> {
        debug!(kind = ?cfg.kind, base = %cfg.base_api, "initializing provider client");
        let http = reqwest::Client::builder()
            .user_agent("docpulse-deliver/0.1")
            .build()?;
        Ok(match cfg.kind {
            ProviderKind::GitHub => {
                ProviderClient::GitHub(GitHubClient::new(http, cfg.base_api, cfg.token))
            }
            ProviderKind::GitLab => {
                ProviderClient::GitLab(GitLabClient::new(http, cfg.base_api, cfg.token))
            }
        })
    }

    /// Open a PR for `head_branch` into `base_branch`, or update the body of
    /// the PR that already exists for that branch.
    pub async fn ensure_pull_request(
        &self,
        repo_slug: &str,
        head_branch: &str,
        base_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequestRef> {
        match self {
            Self::GitHub(c) => {
                c.ensure_pull_request(repo_slug, head_branch, base_branch, title, body)
                    .await
            }
            Self::GitLab(c) => {
                c.ensure_pull_request(repo_slug, head_branch, base_branch, title, body)
                    .await
            }
        }
    }
}

// ===== GitHub (REST v3) =====

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_api: String,
    token: String,
}

impl GitHubClient {
    pub fn new(http: reqwest::Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api,
            token,
        }
    }

    async fn ensure_pull_request(
        &self,
        repo_slug: &str,
        head_branch: &str,
        base_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequestRef> {
        let (owner, _repo) = split_slug(repo_slug)?;
        let list_url = format!("{}/repos/{}/pulls", self.base_api, repo_slug);

        let existing: Vec<GitHubPr> = self
            .http
            .get(&list_url)
            .query(&[
                ("head", format!("{owner}:{head_branch}")),
                ("state", "open".to_string()),
            ])
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(pr) = existing.first() {
            debug!(number = pr.number, "updating existing pull request body");
            let patch_url = format!("{}/repos/{}/pulls/{}", self.base_api, repo_slug, pr.number);
            let updated: GitHubPr = self
                .http
                .patch(&patch_url)
                .bearer_auth(&self.token)
                .header("Accept", "application/vnd.github+json")
                .json(&GitHubPrUpdate { title, body })
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            return Ok(PullRequestRef {
                number: updated.number,
                url: updated.html_url,
                created: false,
            });
        }

        info!(%head_branch, "opening pull request");
        let created: GitHubPr = self
            .http
            .post(&list_url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&GitHubPrCreate {
                title,
                head: head_branch,
                base: base_branch,
                body,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(PullRequestRef {
            number: created.number,
            url: created.html_url,
            created: true,
        })
    }
}

// ===== GitLab (v4) =====

#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: reqwest::Client,
    base_api: String,
    token: String,
}

impl GitLabClient {
    pub fn new(http: reqwest::Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api,
            token,
        }
    }

    async fn ensure_pull_request(
        &self,
        repo_slug: &str,
        head_branch: &str,
        base_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequestRef> {
        let project = urlencoding::encode(repo_slug);
        let list_url = format!("{}/projects/{}/merge_requests", self.base_api, project);

        let existing: Vec<GitLabMr> = self
            .http
            .get(&list_url)
            .query(&[("source_branch", head_branch), ("state", "opened")])
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(mr) = existing.first() {
            debug!(iid = mr.iid, "updating existing merge request description");
            let put_url = format!(
                "{}/projects/{}/merge_requests/{}",
                self.base_api, project, mr.iid
            );
            let updated: GitLabMr = self
                .http
                .put(&put_url)
                .header("PRIVATE-TOKEN", &self.token)
                .json(&GitLabMrUpdate {
                    title,
                    description: body,
                })
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            return Ok(PullRequestRef {
                number: updated.iid,
                url: updated.web_url,
                created: false,
            });
        }

        info!(%head_branch, "opening merge request");
        let created: GitLabMr = self
            .http
            .post(&list_url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&GitLabMrCreate {
                source_branch: head_branch,
                target_branch: base_branch,
                title,
                description: body,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(PullRequestRef {
            number: created.iid,
            url: created.web_url,
            created: true,
        })
    }
}

fn split_slug(slug: &str) -> Result<(String, String)> {
    let mut parts = slug.split('/');
    let owner = parts.next().unwrap_or("").trim();
    let repo = parts.next().unwrap_or("").trim();
    if owner.is_empty() || repo.is_empty() || parts.next().is_some() {
        return Err(DeliveryError::Provider(ProviderError::InvalidResponse(
            format!("invalid repo slug '{slug}', expected 'owner/repo'"),
        )));
    }
    Ok((owner.to_string(), repo.to_string()))
}

// ===== wire types (subsets) =====

#[derive(Debug, Deserialize)]
struct GitHubPr {
    number: u64,
    html_url: String,
}

#[derive(Debug, Serialize)]
struct GitHubPrCreate<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct GitHubPrUpdate<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct GitLabMr {
    iid: u64,
    web_url: String,
}

#[derive(Debug, Serialize)]
struct GitLabMrCreate<'a> {
    source_branch: &'a str,
    target_branch: &'a str,
    title: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct GitLabMrUpdate<'a> {
    title: &'a str,
    description: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parse_accepts_known_kinds() {
        assert_eq!(ProviderKind::parse("github").unwrap(), ProviderKind::GitHub);
        assert_eq!(ProviderKind::parse("GitLab").unwrap(), ProviderKind::GitLab);
        assert!(ProviderKind::parse("bitbucket").is_err());
    }

    #[test]
    fn slug_validation() {
        assert!(split_slug("octo/repo").is_ok());
        assert!(split_slug("justowner").is_err());
        assert!(split_slug("a/b/c").is_err());
    }
}
