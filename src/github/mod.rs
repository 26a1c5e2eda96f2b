//! GitHub implementation of the provider contract, backed by the `gh` CLI
//! for the API surface and plain `git` for file contents and checkout.

mod client;
mod comment;
mod pr;

pub use client::detect_repo;

use std::collections::HashMap;
use std::process::Command as StdCommand;

use anyhow::{Context, Result};
use tokio::sync::OnceCell;

use crate::vcs::{self, CheckoutGuard, Comment, Side};
use pr::PullRequest;

pub struct GithubProvider {
    repo: String,
    /// Jump straight to this PR instead of listing.
    pr_id: Option<u32>,
}

impl GithubProvider {
    pub fn new(repo: String, pr_id: Option<u32>) -> Self {
        Self { repo, pr_id }
    }
}

pub struct PrItem(PullRequest);

impl std::fmt::Display for PrItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {} (@{})", self.0.number, self.0.title, self.0.user.login)
    }
}

impl vcs::ReviewItem for PrItem {}

impl vcs::Provider for GithubProvider {
    type Item = PrItem;
    type Review = GithubReview;

    async fn list(&self) -> Result<Vec<PrItem>> {
        if let Some(id) = self.pr_id {
            let pr = pr::fetch_pr(&self.repo, id).await?;
            return Ok(vec![PrItem(pr)]);
        }
        let prs = pr::fetch_open_prs(&self.repo).await?;
        Ok(prs.into_iter().map(PrItem).collect())
    }

    async fn select(&self, item: PrItem) -> Result<GithubReview> {
        Ok(GithubReview {
            repo: self.repo.clone(),
            pr: item.0,
            comments: OnceCell::new(),
        })
    }
}

pub struct GithubReview {
    repo: String,
    pr: PullRequest,
    // Fetched once, on first demand; later readers share the result.
    comments: OnceCell<HashMap<String, Vec<Comment>>>,
}

impl GithubReview {
    async fn all_comments(&self) -> Result<&HashMap<String, Vec<Comment>>> {
        self.comments
            .get_or_try_init(|| async {
                let raw = comment::fetch_review_comments(&self.repo, self.pr.number).await?;
                let mut by_file: HashMap<String, Vec<Comment>> = HashMap::new();
                for c in raw {
                    if c.commit_id != self.pr.head.sha {
                        // Outdated: anchored to an older head.
                        continue;
                    }
                    let path = c.path.clone();
                    if let Some(c) = c.into_comment() {
                        by_file.entry(path).or_default().push(c);
                    }
                }
                for cs in by_file.values_mut() {
                    cs.sort_by_key(|c| c.created_at);
                }
                Ok(by_file)
            })
            .await
    }
}

impl vcs::Review for GithubReview {
    async fn changed_files(&self) -> Result<Vec<String>> {
        client::git_changed_files(&self.pr.base.sha, &self.pr.head.sha).await
    }

    async fn file_comments(&self, file: &str) -> Result<Vec<Comment>> {
        Ok(self.all_comments().await?.get(file).cloned().unwrap_or_default())
    }

    async fn base_file(&self, file: &str) -> Result<String> {
        client::git_show(&self.pr.base.sha, file).await
    }

    async fn head_file(&self, file: &str) -> Result<String> {
        client::git_show(&self.pr.head.sha, file).await
    }

    fn base_name(&self) -> &str {
        &self.pr.base.sha
    }

    fn head_name(&self) -> &str {
        &self.pr.head.sha
    }

    async fn comment(
        &self,
        file: &str,
        side: Side,
        lo: usize,
        hi: usize,
        body: &str,
    ) -> Result<Comment> {
        let created = comment::create_review_comment(
            &self.repo,
            self.pr.number,
            &self.pr.head.sha,
            file,
            side,
            lo,
            hi,
            body,
        )
        .await?;
        created
            .into_comment()
            .context("created comment came back without a line anchor")
    }

    async fn reply_to(&self, parent: &Comment, body: &str) -> Result<Comment> {
        let parent_id: u64 = parent
            .id
            .parse()
            .with_context(|| format!("non-numeric comment id {:?}", parent.id))?;
        let created =
            comment::create_reply_comment(&self.repo, self.pr.number, parent_id, body).await?;
        created
            .into_comment()
            .context("created reply came back without a line anchor")
    }

    async fn checkout(&self) -> Result<CheckoutGuard> {
        let dir = std::env::temp_dir().join(format!("qrev-checkout-{}", self.pr.number));
        let dir_str = dir.to_string_lossy().into_owned();
        client::git_command(&["worktree", "add", "--detach", &dir_str, &self.pr.head.sha])
            .await
            .context("git worktree add failed")?;
        tracing::debug!("checked out {} into {}", self.pr.head.sha, dir_str);
        Ok(CheckoutGuard::new(dir, move || {
            let out = StdCommand::new("git")
                .args(["worktree", "remove", "--force", &dir_str])
                .output()
                .context("git worktree remove failed to run")?;
            if !out.status.success() {
                anyhow::bail!(
                    "git worktree remove failed: {}",
                    String::from_utf8_lossy(&out.stderr).trim()
                );
            }
            Ok(())
        }))
    }
}
