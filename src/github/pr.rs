use anyhow::{Context, Result};
use serde::Deserialize;

use super::client::gh_api;

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u32,
    pub title: String,
    pub state: String,
    pub head: Branch,
    pub base: Branch,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

pub async fn fetch_pr(repo: &str, pr_number: u32) -> Result<PullRequest> {
    let endpoint = format!("repos/{}/pulls/{}", repo, pr_number);
    let json = gh_api(&endpoint).await?;
    serde_json::from_value(json).context("Failed to parse PR response")
}

/// Open pull requests of the repository, oldest first.
pub async fn fetch_open_prs(repo: &str) -> Result<Vec<PullRequest>> {
    let endpoint = format!(
        "repos/{}/pulls?state=open&sort=created&direction=asc&per_page=100",
        repo
    );
    let json = gh_api(&endpoint).await?;
    serde_json::from_value(json).context("Failed to parse PR list response")
}
