//! The quick-review hunk engine.
//!
//! Consumes ordered edit commands against the base file and produces one
//! rendered buffer per command, tracking base and head line numbers across
//! the whole file. Inline discussion threads are printed next to the lines
//! they anchor to. Buffers can be re-rendered in place after a comment is
//! appended, and context around them can be expanded on demand without
//! recomputing the diff.


use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Read, Seek};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crossterm::style::Stylize;

use crate::ed::{Command, Mode};
use crate::lineseek::LineSeeker;
use crate::text;
use crate::timefmt;
use crate::vcs::{build_threads, Comment, Side, Thread};

/// Threads sharing one `(side, start line)` anchor, ordered by root
/// creation time.
#[derive(Debug, Default)]
pub struct ThreadList {
    threads: Vec<Thread>,
}

impl ThreadList {
    fn push(&mut self, t: Thread) {
        let at = self
            .threads
            .partition_point(|x| x.created_at() <= t.created_at());
        self.threads.insert(at, t);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Thread> {
        self.threads.iter()
    }
}

/// One rendered edit command plus the line bookkeeping captured while it
/// was rendered.
///
/// `head_offset` is the running head-vs-base offset as of *before* this
/// command; `base_lines`/`head_lines` count the lines this command removed
/// and added.
#[derive(Debug)]
pub struct EditBuffer {
    pub cmd: Command,
    pub text: String,

    pub base_start: usize,
    pub base_lines: usize,
    pub head_start: usize,
    pub head_lines: usize,

    pub head_offset: i64,
}

impl EditBuffer {
    /// First base line after the command's range.
    pub fn base_stop(&self) -> usize {
        self.base_start + self.base_lines
    }

    pub fn head_stop(&self) -> usize {
        self.head_start + self.head_lines
    }
}

/// Base distance between two buffers; zero means consecutive.
pub fn base_distance(prev: &EditBuffer, next: &EditBuffer) -> i64 {
    next.base_start as i64 - prev.base_stop() as i64
}

pub struct QuickEngine<R: Read + Seek> {
    base: LineSeeker<R>,

    base_threads: BTreeMap<usize, ThreadList>,
    head_threads: BTreeMap<usize, ThreadList>,
    display_ids: HashMap<String, u64>,
    next_display_id: u64,

    buffers: Vec<EditBuffer>,

    base_edits: HashSet<usize>,
    head_edits: HashSet<usize>,

    // Transient per-command counters, reset by seek().
    base_start: usize,
    base_line: usize,
    base_lines: usize,
    head_start: usize,
    head_line: usize,
    head_lines: usize,

    head_offset: i64,

    color: bool,
    now: DateTime<Utc>,
}

impl<R: Read + Seek> QuickEngine<R> {
    pub fn new(base: R, comments: &[Comment], color: bool) -> Self {
        let mut engine = Self {
            base: LineSeeker::new(base),
            base_threads: BTreeMap::new(),
            head_threads: BTreeMap::new(),
            display_ids: HashMap::new(),
            next_display_id: 0,
            buffers: Vec::new(),
            base_edits: HashSet::new(),
            head_edits: HashSet::new(),
            base_start: 0,
            base_line: 0,
            base_lines: 0,
            head_start: 0,
            head_line: 0,
            head_lines: 0,
            head_offset: 0,
            color,
            now: Utc::now(),
        };

        tracing::debug!("total number of comments: {}", comments.len());
        for t in build_threads(comments) {
            let start = t.lines().0;
            engine.tree_mut(t.side()).entry(start).or_default().push(t);
        }

        // Display ids follow merged (side, start line) order: all base
        // anchors, then all head anchors, root before replies.
        let assign = |tree: &BTreeMap<usize, ThreadList>,
                      ids: &mut HashMap<String, u64>,
                      next: &mut u64| {
            for list in tree.values() {
                for t in list.iter() {
                    for c in t.comments() {
                        tracing::debug!("assigned comment id {:x} for {}", *next, c.id);
                        ids.insert(c.id.clone(), *next);
                        *next += 1;
                    }
                }
            }
        };
        let (base_threads, head_threads) = (
            std::mem::take(&mut engine.base_threads),
            std::mem::take(&mut engine.head_threads),
        );
        assign(&base_threads, &mut engine.display_ids, &mut engine.next_display_id);
        assign(&head_threads, &mut engine.display_ids, &mut engine.next_display_id);
        engine.base_threads = base_threads;
        engine.head_threads = head_threads;

        engine
    }

    fn tree_mut(&mut self, side: Side) -> &mut BTreeMap<usize, ThreadList> {
        match side {
            Side::Base => &mut self.base_threads,
            Side::Head => &mut self.head_threads,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_now(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }

    pub fn buffers(&self) -> &[EditBuffer] {
        &self.buffers
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// The running head-vs-base offset accumulated by all rendered edits.
    pub fn offset(&self) -> i64 {
        self.head_offset
    }

    /// Render `edits` (sorted by start line) into one buffer each.
    pub fn render(&mut self, edits: &[Command]) -> Result<()> {
        let mut edits: Vec<Command> = edits.to_vec();
        edits.sort_by_key(|c| c.start);
        for cmd in edits {
            tracing::debug!(
                "rendering command: {}: {},{}: {:?}",
                cmd.mode,
                cmd.start,
                cmd.end,
                cmd.text
            );
            let prev_offset = self.head_offset;
            let mut out = String::new();
            self.render_command(&mut out, &cmd)?;
            self.buffers.push(EditBuffer {
                cmd,
                text: out,
                base_start: self.base_start,
                base_lines: self.base_lines,
                head_start: self.head_start,
                head_lines: self.head_lines,
                head_offset: prev_offset,
            });
        }
        Ok(())
    }

    /// Re-render a single buffer against the current thread indexes,
    /// leaving the engine's running offset untouched.
    pub fn render_buffer(&mut self, idx: usize) -> Result<()> {
        let saved = self.head_offset;
        self.head_offset = self.buffers[idx].head_offset;
        let cmd = self.buffers[idx].cmd.clone();
        let mut out = String::new();
        let res = self.render_command(&mut out, &cmd);
        self.head_offset = saved;
        res?;
        self.buffers[idx].text = out;
        Ok(())
    }

    fn render_command(&mut self, out: &mut String, cmd: &Command) -> Result<()> {
        self.seek(cmd.start)?;
        match cmd.mode {
            Mode::Add => {
                // Text is inserted after cmd.start, so the first new head
                // line is one below the cursor.
                self.head_line += 1;
                self.insert_lines(out, cmd);
            }
            Mode::Change => {
                while self.base_line <= cmd.end {
                    self.delete_line(out)?;
                }
                self.insert_lines(out, cmd);
            }
            Mode::Delete => {
                while self.base_line <= cmd.end {
                    self.delete_line(out)?;
                }
            }
        }
        Ok(())
    }

    fn seek(&mut self, start: usize) -> Result<()> {
        self.seek_base(start)?;
        self.base_start = start;
        self.base_line = start;
        self.base_lines = 0;
        self.head_start = shifted(start, self.head_offset);
        self.head_line = self.head_start;
        self.head_lines = 0;
        Ok(())
    }

    // The ed script is 1-based, the seeker 0-based; this is the only place
    // the two meet.
    fn seek_base(&mut self, line: usize) -> Result<()> {
        self.base
            .seek_line(line.saturating_sub(1))
            .with_context(|| format!("seek base line {line}"))
    }

    fn delete_line(&mut self, out: &mut String) -> Result<()> {
        let line = self
            .base
            .read_line()?
            .with_context(|| format!("base line {} past end of file", self.base_line))?;
        // Mark before printing so the thread indent below sees the edit.
        self.base_edits.insert(self.base_line);
        self.print_base_line(out, self.base_line, &line);

        self.base_line += 1;
        self.base_lines += 1;
        self.head_offset -= 1;
        Ok(())
    }

    fn insert_lines(&mut self, out: &mut String, cmd: &Command) {
        let lines: Vec<&str> = cmd
            .text
            .split_inclusive('\n')
            .map(|l| l.strip_suffix('\n').unwrap_or(l))
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect();
        for line in lines {
            self.head_edits.insert(self.head_line);
            self.print_head_line(out, self.head_line, line);

            self.head_line += 1;
            self.head_lines += 1;
            self.head_offset += 1;
        }
    }

    /// Register a freshly posted comment and index it for rendering.
    ///
    /// Panics if a reply references a parent that is not indexed; that is a
    /// programming error, not user input.
    pub fn append_comment(&mut self, c: Comment) {
        let start = c.lines().0;
        let side = c.side;
        let parent = c.parent_id.clone();
        let id = c.id.clone();

        let known = self.tree_mut(side).contains_key(&start);
        match (known, parent) {
            (false, Some(_)) => panic!("no thread list found for reply comment"),
            (false, None) => {
                self.tree_mut(side)
                    .entry(start)
                    .or_default()
                    .push(Thread::new(c));
            }
            (true, None) => {
                self.tree_mut(side)
                    .get_mut(&start)
                    .unwrap()
                    .push(Thread::new(c));
            }
            (true, Some(parent_id)) => {
                let list = self.tree_mut(side).get_mut(&start).unwrap();
                let thread = list
                    .threads
                    .iter_mut()
                    .find(|t| t.contains(&parent_id))
                    .unwrap_or_else(|| panic!("no thread found for reply comment"));
                thread.push(c);
            }
        }

        tracing::debug!("assigned comment id {:x} for {}", self.next_display_id, id);
        self.display_ids.insert(id, self.next_display_id);
        self.next_display_id += 1;
    }

    /// The hex id the user types to address a comment.
    pub fn display_id(&self, c: &Comment) -> String {
        let id = self
            .display_ids
            .get(&c.id)
            .unwrap_or_else(|| panic!("no display id for comment {}", c.id));
        format!("{id:x}")
    }

    /// Resolve a typed hex id back to its comment.
    pub fn comment_by_display_id(&self, hex: &str) -> Option<Comment> {
        let want = u64::from_str_radix(hex.trim(), 16).ok()?;
        let id = self
            .display_ids
            .iter()
            .find(|(_, &v)| v == want)
            .map(|(k, _)| k.clone())?;
        self.base_threads
            .values()
            .chain(self.head_threads.values())
            .flat_map(|l| l.iter())
            .flat_map(|t| t.comments())
            .find(|c| c.id == id)
            .cloned()
    }

    /// Threads whose anchor falls in `[base_lo, base_hi)` on the base side
    /// or `[head_lo, head_hi)` on the head side, base side first.
    pub fn threads_between(
        &self,
        base_lo: usize,
        base_hi: usize,
        head_lo: usize,
        head_hi: usize,
    ) -> Vec<&Thread> {
        let mut out = Vec::new();
        for list in self.base_threads.range(base_lo..base_hi).map(|(_, l)| l) {
            out.extend(list.iter());
        }
        for list in self.head_threads.range(head_lo..head_hi).map(|(_, l)| l) {
            out.extend(list.iter());
        }
        out
    }

    /// Print context lines `[prev.base_stop, next.base_start)` between two
    /// buffers. Returns the number of lines printed.
    pub fn expand_between(&mut self, out: &mut String, prev: usize, next: usize) -> Result<usize> {
        let lo = self.buffers[prev].base_stop();
        let hi = self.buffers[next].base_start;
        let offset = self.buffers[prev].head_offset;
        self.expand(out, lo, hi, offset)
    }

    /// Print up to `lines` context lines above buffer `idx`, never crossing
    /// the previous buffer or the start of the file.
    pub fn expand_before(&mut self, out: &mut String, idx: usize, lines: usize) -> Result<usize> {
        let e = &self.buffers[idx];
        let mut lo = e.base_start.saturating_sub(lines);
        let hi = e.base_start;
        let mut offset = e.head_offset;
        if idx > 0 {
            let prev = &self.buffers[idx - 1];
            offset = prev.head_offset;
            lo = lo.max(prev.base_stop());
        }
        self.expand(out, lo, hi, offset)
    }

    /// Print up to `lines` context lines below buffer `idx`, never crossing
    /// the next buffer or the end of the file.
    pub fn expand_after(&mut self, out: &mut String, idx: usize, lines: usize) -> Result<usize> {
        let e = &self.buffers[idx];
        let lo = e.base_stop();
        let mut hi = lo + lines;
        let mut offset = e.head_offset;
        if idx + 1 < self.buffers.len() {
            let next = &self.buffers[idx + 1];
            offset = next.head_offset;
            hi = hi.min(next.base_start);
        }
        self.expand(out, lo, hi, offset)
    }

    fn expand(&mut self, out: &mut String, lo: usize, hi: usize, offset: i64) -> Result<usize> {
        // Line numbers are 1-based; an insert-at-top edit has base_stop 0.
        let mut lo = lo.max(1);
        if lo >= hi {
            return Ok(0);
        }
        self.seek_base(lo)?;
        let mut n = 0;
        while lo < hi {
            let Some(line) = self.base.read_line()? else {
                break;
            };
            self.print_line(out, lo, shifted(lo, offset), &line);
            lo += 1;
            n += 1;
        }
        Ok(n)
    }

    /// Whether more context is available above buffer `idx` after already
    /// expanding `expand` lines.
    pub fn has_lines_before(&self, idx: usize, expand: usize) -> bool {
        let e = &self.buffers[idx];
        let reach = e.base_start as i64 - expand as i64;
        match idx.checked_sub(1).map(|i| &self.buffers[i]) {
            Some(prev) => reach - prev.base_stop() as i64 > 0,
            None => reach > 1,
        }
    }

    /// Whether more context is available below buffer `idx` after already
    /// expanding `expand` lines.
    pub fn has_lines_after(&mut self, idx: usize, expand: usize) -> bool {
        let e = &self.buffers[idx];
        let target = (e.base_stop() + expand).max(1);
        match self.buffers.get(idx + 1) {
            Some(next) => next.base_start as i64 - target as i64 > 0,
            // 1-based line `target` must still exist in the base file.
            None => self.base.has_line(target - 1),
        }
    }

    fn print_line(&self, out: &mut String, base: usize, head: usize, content: &str) {
        out.push_str(&format!("  {base:>4}  {head:>4} {content}\n"));
        self.print_base_threads(out, base);
        self.print_head_threads(out, head);
    }

    fn print_base_line(&self, out: &mut String, num: usize, content: &str) {
        let line = format!("- {num:>4}       {content}");
        if self.color {
            out.push_str(&format!("{}\n", line.red()));
        } else {
            out.push_str(&line);
            out.push('\n');
        }
        self.print_base_threads(out, num);
    }

    fn print_head_line(&self, out: &mut String, num: usize, content: &str) {
        let line = format!("+       {num:>4} {content}");
        if self.color {
            out.push_str(&format!("{}\n", line.green()));
        } else {
            out.push_str(&line);
            out.push('\n');
        }
        self.print_head_threads(out, num);
    }

    fn print_base_threads(&self, out: &mut String, line: usize) {
        if let Some(list) = self.base_threads.get(&line) {
            for t in list.iter() {
                self.print_thread(out, t);
            }
        }
    }

    fn print_head_threads(&self, out: &mut String, line: usize) {
        if let Some(list) = self.head_threads.get(&line) {
            for t in list.iter() {
                self.print_thread(out, t);
            }
        }
    }

    fn print_thread(&self, out: &mut String, t: &Thread) {
        let anchor = t.lines().0;
        let mut side = t.side();
        if !self.head_edits.contains(&anchor) && !self.base_edits.contains(&anchor) {
            // Threads on untouched lines read as base-side context.
            side = Side::Base;
        }
        let pad = match side {
            Side::Base => 2,
            Side::Head => 8,
        };

        let titles: Vec<String> = t
            .comments()
            .iter()
            .map(|c| {
                format!(
                    "[{}] @{}, {}:",
                    self.display_id(c),
                    c.author,
                    timefmt::format_since(c.created_at, self.now)
                )
            })
            .collect();
        let bodies: Vec<String> = t
            .comments()
            .iter()
            .map(|c| c.body.trim().replace("\r\n", "\n").replace('\r', "\n"))
            .collect();

        let max_line = titles
            .iter()
            .chain(bodies.iter())
            .map(|s| text::max_line_width(s))
            .max()
            .unwrap_or(0);
        // Borders and their inner padding eat four columns past the indent.
        let width = (80usize.saturating_sub(pad + 4)).min(max_line).max(1);

        let indent = " ".repeat(pad);
        let rule = format!("{indent}+{}+\n", "-".repeat(width + 2));

        out.push_str(&rule);
        for (i, (title, body)) in titles.iter().zip(&bodies).enumerate() {
            if i > 0 {
                out.push_str(&rule);
            }
            for src in [title, body] {
                for line in text::wrap(src, width) {
                    out.push_str(&format!("{indent}| {line:<width$} |\n"));
                }
            }
        }
        out.push_str(&rule);
    }
}

fn shifted(line: usize, offset: i64) -> usize {
    (line as i64 + offset) as usize
}
