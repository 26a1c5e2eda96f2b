//! Provider-neutral review model: comments, threads, and the contract a
//! hosting service implementation has to satisfy.

mod thread;

pub use thread::{build_threads, Thread};

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Which revision of the file a comment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    /// The "before" revision.
    Base,
    /// The "after" revision.
    Head,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Base => write!(f, "base"),
            Side::Head => write!(f, "head"),
        }
    }
}

/// One review comment as retrieved from (or accepted by) the provider.
///
/// `id` is opaque and stable. Replies reference their thread root through
/// `parent_id`; the thread model owns the only strong edges.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub body: String,
    pub side: Side,
    pub lo: usize,
    pub hi: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: String,
    pub parent_id: Option<String>,
}

impl Comment {
    /// The inclusive anchored line range; `lo == hi` for single-line
    /// comments.
    pub fn lines(&self) -> (usize, usize) {
        (self.lo, self.hi)
    }
}

/// A checked-out copy of the head revision. The cleanup runs exactly once,
/// on drop or through [`CheckoutGuard::finish`].
pub struct CheckoutGuard {
    pub dir: PathBuf,
    cleanup: Option<Box<dyn FnOnce() -> Result<()> + Send>>,
}

impl CheckoutGuard {
    pub fn new(dir: PathBuf, cleanup: impl FnOnce() -> Result<()> + Send + 'static) -> Self {
        Self {
            dir,
            cleanup: Some(Box::new(cleanup)),
        }
    }

    /// Run the cleanup now and surface its error.
    pub fn finish(mut self) -> Result<()> {
        match self.cleanup.take() {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

impl Drop for CheckoutGuard {
    fn drop(&mut self) {
        if let Some(f) = self.cleanup.take() {
            if let Err(e) = f() {
                tracing::warn!("checkout cleanup error: {e:#}");
            }
        }
    }
}

/// Something the user can pick from the review list.
pub trait ReviewItem: fmt::Display {}

/// A source of reviews (for GitHub: the open pull requests of a repo).
#[allow(async_fn_in_trait)]
pub trait Provider {
    type Item: ReviewItem;
    type Review: Review;

    async fn list(&self) -> Result<Vec<Self::Item>>;
    async fn select(&self, item: Self::Item) -> Result<Self::Review>;
}

/// One selected review: two revisions of a set of files plus the
/// discussion attached to them.
#[allow(async_fn_in_trait)]
pub trait Review {
    async fn changed_files(&self) -> Result<Vec<String>>;
    async fn file_comments(&self, file: &str) -> Result<Vec<Comment>>;

    async fn base_file(&self, file: &str) -> Result<String>;
    async fn head_file(&self, file: &str) -> Result<String>;

    /// Opaque revision identifiers for display.
    fn base_name(&self) -> &str;
    fn head_name(&self) -> &str;

    async fn comment(
        &self,
        file: &str,
        side: Side,
        lo: usize,
        hi: usize,
        body: &str,
    ) -> Result<Comment>;
    async fn reply_to(&self, parent: &Comment, body: &str) -> Result<Comment>;

    /// Materialize the head revision in a scratch working directory.
    async fn checkout(&self) -> Result<CheckoutGuard>;

    fn close(&self) {}
}
