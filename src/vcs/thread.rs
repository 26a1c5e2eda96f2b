use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::{Comment, Side};

/// A non-empty discussion: one root comment followed by its replies,
/// ordered by creation time.
#[derive(Debug, Clone)]
pub struct Thread(Vec<Comment>);

impl Thread {
    pub fn new(root: Comment) -> Self {
        Self(vec![root])
    }

    pub fn root(&self) -> &Comment {
        &self.0[0]
    }

    /// The anchored line range of the thread (its root's range).
    pub fn lines(&self) -> (usize, usize) {
        self.root().lines()
    }

    pub fn side(&self) -> Side {
        self.root().side
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.root().created_at
    }

    pub fn comments(&self) -> &[Comment] {
        &self.0
    }

    pub fn push(&mut self, c: Comment) {
        self.0.push(c);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|c| c.id == id)
    }
}

/// Group a flat comment list into threads.
///
/// The root key of a comment is its `parent_id` when present, otherwise its
/// own id; all comments sharing a root key form one thread. Comments within
/// a thread are sorted by creation time, threads by `(anchor line, root
/// creation time)`. A thread whose root never appears in the input is still
/// formed, keyed by the first comment seen for it.
pub fn build_threads(comments: &[Comment]) -> Vec<Thread> {
    let mut order: Vec<Vec<Comment>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for c in comments {
        let key = c.parent_id.as_deref().unwrap_or(&c.id);
        match index.get(key) {
            Some(&i) => order[i].push(c.clone()),
            None => {
                index.insert(key, order.len());
                order.push(vec![c.clone()]);
            }
        }
    }

    let mut threads: Vec<Thread> = order
        .into_iter()
        .map(|mut cs| {
            cs.sort_by_key(|c| c.created_at);
            Thread(cs)
        })
        .collect();
    threads.sort_by_key(|t| (t.lines().0, t.created_at()));
    threads
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn comment(id: &str, parent: Option<&str>, line: usize, at: i64) -> Comment {
        let t = Utc.timestamp_opt(at, 0).unwrap();
        Comment {
            id: id.to_owned(),
            body: format!("body of {id}"),
            side: Side::Head,
            lo: line,
            hi: line,
            created_at: t,
            updated_at: t,
            author: "reviewer".to_owned(),
            parent_id: parent.map(str::to_owned),
        }
    }

    #[test]
    fn test_every_comment_lands_in_exactly_one_thread() {
        let cs = vec![
            comment("1", None, 10, 100),
            comment("2", Some("1"), 10, 200),
            comment("3", None, 4, 50),
            comment("4", Some("1"), 10, 150),
        ];
        let threads = build_threads(&cs);
        assert_eq!(threads.len(), 2);
        let total: usize = threads.iter().map(|t| t.comments().len()).sum();
        assert_eq!(total, cs.len());
        let mut ids: Vec<&str> = threads
            .iter()
            .flat_map(|t| t.comments().iter().map(|c| c.id.as_str()))
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_replies_sorted_by_creation_time() {
        let cs = vec![
            comment("r", None, 1, 100),
            comment("b", Some("r"), 1, 300),
            comment("a", Some("r"), 1, 200),
        ];
        let threads = build_threads(&cs);
        let ids: Vec<&str> = threads[0].comments().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["r", "a", "b"]);
    }

    #[test]
    fn test_threads_sorted_by_anchor_then_created() {
        let cs = vec![
            comment("late", None, 5, 900),
            comment("early", None, 5, 100),
            comment("top", None, 2, 500),
        ];
        let threads = build_threads(&cs);
        let roots: Vec<&str> = threads.iter().map(|t| t.root().id.as_str()).collect();
        assert_eq!(roots, vec!["top", "early", "late"]);
    }

    #[test]
    fn test_orphan_reply_forms_its_own_thread() {
        let cs = vec![comment("x", Some("gone"), 7, 10)];
        let threads = build_threads(&cs);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].root().id, "x");
    }

    #[test]
    fn test_reply_arriving_before_root_joins_it() {
        let cs = vec![comment("r2", Some("r1"), 3, 200), comment("r1", None, 3, 100)];
        let threads = build_threads(&cs);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].root().id, "r1");
        assert_eq!(threads[0].comments().len(), 2);
    }
}
