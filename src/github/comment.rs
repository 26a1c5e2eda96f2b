use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::client::{gh_api, gh_api_post, FieldValue};
use super::pr::User;
use crate::vcs::{Comment, Side};

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    pub path: String,
    pub body: String,
    pub line: Option<u64>,
    pub start_line: Option<u64>,
    pub side: Option<String>,
    pub commit_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: User,
    pub in_reply_to_id: Option<u64>,
}

impl ReviewComment {
    /// Convert to the provider-neutral model. Comments without a line
    /// (file-level or outdated position) carry no anchor and are dropped.
    pub fn into_comment(self) -> Option<Comment> {
        let hi = self.line? as usize;
        let lo = self.start_line.map(|l| l as usize).unwrap_or(hi);
        Some(Comment {
            id: self.id.to_string(),
            body: self.body,
            side: parse_side(self.side.as_deref()),
            lo,
            hi,
            created_at: self.created_at,
            updated_at: self.updated_at,
            author: self.user.login,
            parent_id: self.in_reply_to_id.map(|id| id.to_string()),
        })
    }
}

fn parse_side(side: Option<&str>) -> Side {
    match side {
        Some("LEFT") => Side::Base,
        _ => Side::Head,
    }
}

fn side_of(side: Side) -> &'static str {
    match side {
        Side::Base => "LEFT",
        Side::Head => "RIGHT",
    }
}

pub async fn fetch_review_comments(repo: &str, pr_number: u32) -> Result<Vec<ReviewComment>> {
    let endpoint = format!(
        "repos/{}/pulls/{}/comments?sort=created&direction=asc&per_page=100",
        repo, pr_number
    );
    let json = gh_api(&endpoint).await?;
    serde_json::from_value(json).context("Failed to parse review comments response")
}

pub async fn create_review_comment(
    repo: &str,
    pr_number: u32,
    commit_id: &str,
    path: &str,
    side: Side,
    lo: usize,
    hi: usize,
    body: &str,
) -> Result<ReviewComment> {
    let endpoint = format!("repos/{}/pulls/{}/comments", repo, pr_number);
    let lo_str = lo.to_string();
    let hi_str = hi.to_string();
    let mut fields = vec![
        ("body", FieldValue::String(body)),
        ("commit_id", FieldValue::String(commit_id)),
        ("path", FieldValue::String(path)),
        ("side", FieldValue::String(side_of(side))),
        ("line", FieldValue::Raw(&hi_str)),
    ];
    if lo < hi {
        fields.push(("start_line", FieldValue::Raw(&lo_str)));
        fields.push(("start_side", FieldValue::String(side_of(side))));
    }
    let json = gh_api_post(&endpoint, &fields).await?;
    serde_json::from_value(json).context("Failed to parse created comment response")
}

pub async fn create_reply_comment(
    repo: &str,
    pr_number: u32,
    comment_id: u64,
    body: &str,
) -> Result<ReviewComment> {
    let endpoint = format!(
        "repos/{}/pulls/{}/comments/{}/replies",
        repo, pr_number, comment_id
    );
    let json = gh_api_post(&endpoint, &[("body", FieldValue::String(body))]).await?;
    serde_json::from_value(json).context("Failed to parse reply comment response")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(line: Option<u64>, start_line: Option<u64>, side: Option<&str>) -> ReviewComment {
        ReviewComment {
            id: 42,
            path: "src/main.rs".to_owned(),
            body: "hm".to_owned(),
            line,
            start_line,
            side: side.map(str::to_owned),
            commit_id: "abc".to_owned(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            user: User { login: "alice".to_owned() },
            in_reply_to_id: None,
        }
    }

    #[test]
    fn test_into_comment_single_line() {
        let c = sample(Some(7), None, Some("RIGHT")).into_comment().unwrap();
        assert_eq!((c.lo, c.hi), (7, 7));
        assert_eq!(c.side, Side::Head);
        assert_eq!(c.id, "42");
    }

    #[test]
    fn test_into_comment_multiline_left() {
        let c = sample(Some(9), Some(5), Some("LEFT")).into_comment().unwrap();
        assert_eq!((c.lo, c.hi), (5, 9));
        assert_eq!(c.side, Side::Base);
    }

    #[test]
    fn test_into_comment_without_line_is_dropped() {
        assert!(sample(None, None, None).into_comment().is_none());
    }
}
