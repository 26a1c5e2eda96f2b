//! The interactive controller: review selection, file picking, and the
//! per-file flows. Quick mode walks rendered hunks in the terminal; diff
//! mode opens the user's editor on an (optionally annotated) head copy and
//! posts the resulting edits back; checkout mode edits a scratch worktree.

use std::fs::File;
use std::io::{IsTerminal, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::annotate::{annotate, remap_edit};
use crate::cancel::Cancel;
use crate::config::{Config, ReviewMode};
use crate::ed::{self, Command, Mode};
use crate::editor;
use crate::prompt::{self, Key};
use crate::quick::{base_distance, QuickEngine};
use crate::temp::Session;
use crate::vcs::{Comment, Provider, Review, Side};

pub struct Runner<'a, P: Provider> {
    provider: &'a P,
    config: &'a Config,
    cancel: Cancel,
}

impl<'a, P: Provider> Runner<'a, P> {
    pub fn new(provider: &'a P, config: &'a Config, cancel: Cancel) -> Self {
        Self {
            provider,
            config,
            cancel,
        }
    }

    pub async fn start(&self) -> Result<()> {
        let review = self.select_review().await?;
        let res = match self.config.mode {
            ReviewMode::Quick => self.review_quick(&review).await,
            ReviewMode::Diff => self.review_diff(&review).await,
            ReviewMode::Checkout => self.review_checkout(&review).await,
        };
        review.close();
        res
    }

    async fn select_review(&self) -> Result<P::Review> {
        let mut items = self.provider.list().await?;
        let item = match items.len() {
            0 => bail!("no open reviews"),
            1 => {
                let label = items[0].to_string();
                if !prompt::confirm(&format!("Review `{label}`?"))? {
                    bail!("nothing selected");
                }
                items.remove(0)
            }
            _ => {
                let labels: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                let i = prompt::select("Choose a review:", &labels)?;
                items.remove(i)
            }
        };
        self.provider.select(item).await
    }

    async fn pick_files(&self, review: &P::Review) -> Result<Vec<String>> {
        let files = review.changed_files().await?;
        if files.is_empty() {
            bail!("no changed files in this review");
        }
        let picked = prompt::multi_select("Pick files to review:", &files)?;
        Ok(picked.into_iter().map(|i| files[i].clone()).collect())
    }

    // ── quick mode ──

    async fn review_quick(&self, review: &P::Review) -> Result<()> {
        let files = self.pick_files(review).await?;
        let tmp = Session::new()?;
        for file in &files {
            if self.cancel.is_cancelled() {
                break;
            }
            // A failure is fatal to this file only; the rest proceed.
            if let Err(e) = self.quick_file(review, &tmp, file).await {
                eprintln!("{file}: {e:#}");
            }
        }
        Ok(())
    }

    async fn quick_file(&self, review: &P::Review, tmp: &Session, file: &str) -> Result<()> {
        let base_src = review.base_file(file).await?;
        let head_src = review.head_file(file).await?;
        let base_path = tmp.create_file("base", file, &base_src, true)?;
        let head_path = tmp.create_file("head", file, &head_src, true)?;

        let comments = match review.file_comments(file).await {
            Ok(cs) => cs,
            Err(e) => {
                eprintln!("warning: fetching comments for {file}: {e:#}");
                Vec::new()
            }
        };

        let edits = self.diff_ed(&base_path, &head_path).await?;
        if edits.is_empty() {
            println!("{file}: no changes");
            return Ok(());
        }

        let color = std::io::stdout().is_terminal();
        let mut engine = QuickEngine::new(
            File::open(&base_path).with_context(|| format!("open {}", base_path.display()))?,
            &comments,
            color,
        );
        engine.render(&edits)?;

        println!("index {}..{}", review.base_name(), review.head_name());
        println!("--- a/{file}");
        println!("+++ b/{file}");

        self.hunk_loop(review, file, &mut engine).await
    }

    async fn hunk_loop(
        &self,
        review: &P::Review,
        file: &str,
        engine: &mut QuickEngine<File>,
    ) -> Result<()> {
        let ctx_after = self.config.context_after;
        let mut view = HunkView {
            start: 0,
            end: absorb_forward(engine, 0, ctx_after),
            before: self.config.context_before,
            after: ctx_after,
            base_lo: 0,
            base_hi: 0,
            head_lo: 0,
            head_hi: 0,
        };

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.print_hunk(engine, &mut view)?;
            print!("[p]rev [n]ext [b]efore [a]fter [c]omment [r]eply [d]checkout [q]uit > ");
            std::io::stdout().flush().ok();
            let key = prompt::read_key()?;
            println!();

            match key {
                Key::Interrupt | Key::Char('q') => break,
                Key::Char('n') => {
                    if view.end + 1 < engine.len() {
                        view.start = view.end + 1;
                        view.end = absorb_forward(engine, view.start, ctx_after);
                        view.before = self.config.context_before;
                        view.after = ctx_after;
                    } else {
                        println!("already at the last hunk");
                    }
                }
                Key::Char('p') => {
                    if view.start > 0 {
                        view.end = view.start - 1;
                        view.start = absorb_backward(engine, view.end, ctx_after);
                        view.before = self.config.context_before;
                        view.after = ctx_after;
                    } else {
                        println!("already at the first hunk");
                    }
                }
                Key::Char('b') => {
                    if engine.has_lines_before(view.start, view.before) {
                        view.before += 5;
                    } else if view.start > 0 {
                        // No source lines left; absorb the neighbour.
                        view.start -= 1;
                    } else {
                        println!("top of file");
                    }
                }
                Key::Char('a') => {
                    if engine.has_lines_after(view.end, view.after) {
                        view.after += 5;
                    } else if view.end + 1 < engine.len() {
                        view.end += 1;
                    } else {
                        println!("end of file");
                    }
                }
                Key::Char('c') => {
                    if let Err(e) = self.comment_flow(review, file, engine, &view).await {
                        eprintln!("comment failed: {e:#}");
                    }
                }
                Key::Char('r') => {
                    if let Err(e) = self.reply_flow(review, engine, &view).await {
                        eprintln!("reply failed: {e:#}");
                    }
                }
                Key::Char('d') => {
                    if let Err(e) = self.checkout_flow(review, file, engine, &view).await {
                        eprintln!("checkout failed: {e:#}");
                    }
                }
                Key::Char(_) => {
                    println!("keys: p/n move, b/a expand context, c comment, r reply, d checkout, q quit");
                }
            }
        }
        Ok(())
    }

    fn print_hunk(&self, engine: &mut QuickEngine<File>, view: &mut HunkView) -> Result<()> {
        let mut before = String::new();
        let nb = engine.expand_before(&mut before, view.start, view.before)?;
        let mut after = String::new();
        let na = engine.expand_after(&mut after, view.end, view.after)?;

        let (first_base, first_head) = {
            let f = &engine.buffers()[view.start];
            (f.base_start, f.head_start)
        };
        let (last_base_stop, last_head_stop) = {
            let l = &engine.buffers()[view.end];
            (l.base_stop(), l.head_stop())
        };
        let b_start = first_base.saturating_sub(nb);
        let h_start = first_head.saturating_sub(nb);
        let b_count = last_base_stop + na - b_start;
        let h_count = last_head_stop + na - h_start;

        println!("@@ -{b_start},{b_count} +{h_start},{h_count}:");
        print!("{before}");
        for i in view.start..=view.end {
            print!("{}", engine.buffers()[i].text);
            if i < view.end {
                let mut mid = String::new();
                engine.expand_between(&mut mid, i, i + 1)?;
                print!("{mid}");
            }
        }
        print!("{after}");

        // Remember what the hunk covers; the reply quiz scans this range.
        view.base_lo = b_start;
        view.base_hi = last_base_stop + na;
        view.head_lo = h_start;
        view.head_hi = last_head_stop + na;
        Ok(())
    }

    async fn comment_flow(
        &self,
        review: &P::Review,
        file: &str,
        engine: &mut QuickEngine<File>,
        view: &HunkView,
    ) -> Result<()> {
        let spec = prompt::input("line range ([+|-]<n>[:<m>])")?;
        let (side, lo, hi) = parse_line_range(&spec)?;
        let body = prompt::input("comment")?;
        let body = body.trim();
        if body.is_empty() {
            println!("empty comment; skipping");
            return Ok(());
        }
        if self.config.preview {
            println!("{side} comment on {file} lines {lo}:{hi}:\n{body}");
            if !prompt::confirm("send?")? {
                return Ok(());
            }
        }
        let c = review.comment(file, side, lo, hi, body).await?;
        engine.append_comment(c);
        self.rerender(engine, view)
    }

    async fn reply_flow(
        &self,
        review: &P::Review,
        engine: &mut QuickEngine<File>,
        view: &HunkView,
    ) -> Result<()> {
        let width = prompt::terminal_width();
        let candidates: Vec<String> = {
            let threads =
                engine.threads_between(view.base_lo, view.base_hi, view.head_lo, view.head_hi);
            let mut ids = Vec::new();
            for t in &threads {
                for c in t.comments() {
                    let id = engine.display_id(c);
                    println!("[{}] @{}: {}", id, c.author, first_line(&c.body, width));
                    ids.push(id);
                }
            }
            ids
        };
        if candidates.is_empty() {
            println!("no comments in this hunk");
            return Ok(());
        }

        let id = prompt::input("reply to id")?;
        let id = id.trim();
        if !candidates.iter().any(|c| c.as_str() == id) {
            bail!("comment {id:?} is not in this hunk");
        }
        let parent = engine
            .comment_by_display_id(id)
            .with_context(|| format!("no comment with id {id:?}"))?;

        let body = prompt::input("reply")?;
        let body = body.trim();
        if body.is_empty() {
            println!("empty reply; skipping");
            return Ok(());
        }
        if self.config.preview {
            println!("reply to @{}:\n{}", parent.author, body);
            if !prompt::confirm("send?")? {
                return Ok(());
            }
        }
        let c = review.reply_to(&parent, body).await?;
        engine.append_comment(c);
        self.rerender(engine, view)
    }

    async fn checkout_flow(
        &self,
        review: &P::Review,
        file: &str,
        engine: &QuickEngine<File>,
        view: &HunkView,
    ) -> Result<()> {
        let co = review.checkout().await?;
        let head_line = engine.buffers()[view.start].head_start.max(1);
        let res = editor::open_file_at_line(
            self.config.editor.as_deref(),
            &co.dir.join(file),
            head_line,
        );
        let cleanup = co.finish();
        res?;
        cleanup
    }

    fn rerender(&self, engine: &mut QuickEngine<File>, view: &HunkView) -> Result<()> {
        for i in view.start..=view.end {
            engine.render_buffer(i)?;
        }
        Ok(())
    }

    // ── diff mode ──

    async fn review_diff(&self, review: &P::Review) -> Result<()> {
        let files = self.pick_files(review).await?;
        let tmp = Session::new()?;
        for file in &files {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Err(e) = self.diff_file(review, &tmp, file).await {
                eprintln!("{file}: {e:#}");
            }
        }
        Ok(())
    }

    async fn diff_file(&self, review: &P::Review, tmp: &Session, file: &str) -> Result<()> {
        let base_src = review.base_file(file).await?;
        let ro_base = tmp.create_file("base", file, &base_src, true)?;
        let head_src = review.head_file(file).await?;

        let (comments, blocks, head_text) = if self.config.annotate {
            let comments = review.file_comments(file).await?;
            let (annotated, blocks) = annotate(&head_src, &comments);
            (comments, blocks, annotated)
        } else {
            (Vec::new(), Vec::new(), head_src)
        };
        let ro_head = tmp.create_file("head", file, &head_text, true)?;
        let rw_head = tmp.create_file("head", file, &head_text, false)?;

        editor::open_diff(self.config.editor.as_deref(), &rw_head, &ro_base)?;

        // The user may add lines right before and right after one comment
        // block; that yields two remapped edits with touching ranges, which
        // are posted independently.
        let raw = self.diff_ed(&ro_head, &rw_head).await?;
        let mut edits: Vec<Command> = Vec::new();
        for cmd in raw {
            remap_edit(&blocks, cmd, |c| edits.push(c));
        }

        for cmd in &edits {
            if self.config.preview {
                println!("{file}: {} {},{}:\n{}", cmd.mode, cmd.start, cmd.end, cmd.text);
                if !prompt::confirm("send?")? {
                    continue;
                }
            }
            if let Err(e) = self.post_edit(review, file, &comments, cmd).await {
                eprintln!("{file}: posting edit at line {}: {e:#}", cmd.start);
            }
        }
        Ok(())
    }

    /// Turn one remapped edit into a provider call: deletions become range
    /// comments, single-line changes become suggestions, and added text is
    /// posted as a comment, a suggestion (`+` prefix) or a reply
    /// (`#<id>:` prefix).
    async fn post_edit(
        &self,
        review: &P::Review,
        file: &str,
        comments: &[Comment],
        cmd: &Command,
    ) -> Result<()> {
        match cmd.mode {
            Mode::Delete => {
                let body = if cmd.start == cmd.end {
                    "Suggest removing this line.".to_owned()
                } else {
                    format!("Suggest removing lines {}-{}.", cmd.start, cmd.end)
                };
                review
                    .comment(file, Side::Head, cmd.start, cmd.end, &body)
                    .await?;
            }
            Mode::Change => {
                if cmd.start != cmd.end {
                    bail!("multiline suggestions are not supported yet");
                }
                let body = format!("```suggestion\n{}```", cmd.text);
                review
                    .comment(file, Side::Head, cmd.start, cmd.start, &body)
                    .await?;
            }
            Mode::Add => {
                let body = cmd.text.trim();
                if body.is_empty() {
                    tracing::debug!("empty comment; skipping");
                    return Ok(());
                }
                if let Some(rest) = body.strip_prefix('+') {
                    let body = format!("```suggestion\n{}\n```", rest.trim_start());
                    review
                        .comment(file, Side::Head, cmd.start, cmd.start, &body)
                        .await?;
                    return Ok(());
                }
                if let Some(rest) = body.strip_prefix('#') {
                    if let Some((id, reply)) = rest.split_once(':') {
                        if let Some(parent) = comments.iter().find(|c| c.id == id.trim()) {
                            review.reply_to(parent, reply.trim()).await?;
                            return Ok(());
                        }
                        eprintln!("warning: unknown parent comment id {:?}", id.trim());
                    }
                }
                review
                    .comment(file, Side::Head, cmd.start, cmd.start, body)
                    .await?;
            }
        }
        Ok(())
    }

    // ── checkout mode ──

    async fn review_checkout(&self, review: &P::Review) -> Result<()> {
        let files = self.pick_files(review).await?;
        let co = review.checkout().await?;
        let tmp = Session::new()?;

        let mut res = Ok(());
        for file in &files {
            if self.cancel.is_cancelled() {
                break;
            }
            res = self.checkout_file(review, &tmp, &co.dir, file).await;
            if res.is_err() {
                break;
            }
        }
        let cleanup = co.finish();
        res?;
        cleanup
    }

    async fn checkout_file(
        &self,
        review: &P::Review,
        tmp: &Session,
        work_dir: &Path,
        file: &str,
    ) -> Result<()> {
        let base_src = review.base_file(file).await?;
        let ro_base = tmp.create_file("base", file, &base_src, true)?;

        let mut head_path = work_dir.join(file);
        if !head_path.exists() {
            // Deleted in head: give the editor an empty marker file.
            if let Some(parent) = head_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            head_path.set_file_name(format!(
                "{}.deleted",
                head_path.file_name().unwrap_or_default().to_string_lossy()
            ));
            std::fs::write(&head_path, "")?;
        } else if self.config.annotate {
            let head_src = review.head_file(file).await?;
            let comments = review.file_comments(file).await?;
            let (annotated, _) = annotate(&head_src, &comments);
            std::fs::write(&head_path, annotated)?;
        }

        editor::open_diff(self.config.editor.as_deref(), &head_path, &ro_base)
    }

    // ── external diff ──

    /// Run `diff --ed` over two files and parse the script. Exit codes 0
    /// (same) and 1 (different) are fine; anything else is an error.
    async fn diff_ed(&self, prev: &Path, next: &Path) -> Result<Vec<Command>> {
        tracing::debug!("executing diff --ed --text {} {}", prev.display(), next.display());
        let mut command = tokio::process::Command::new("diff");
        command.arg("--ed").arg("--text").arg(prev).arg(next);
        command.kill_on_drop(true);

        let mut cancel = self.cancel.clone();
        let output = tokio::select! {
            out = command.output() => out.context("failed to run diff")?,
            _ = cancel.cancelled() => bail!("cancelled"),
        };
        match output.status.code() {
            Some(0) | Some(1) => {}
            code => bail!(
                "diff exited with status {:?}: {}",
                code,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }

        let mut edits = Vec::new();
        ed::parse_script(&output.stdout[..], |c| edits.push(c))?;
        edits.sort_by_key(|c| c.start);
        Ok(edits)
    }
}

/// Buffers displayed as one hunk, plus the context expansion state and the
/// line ranges covered by the last print.
struct HunkView {
    start: usize,
    end: usize,
    before: usize,
    after: usize,
    base_lo: usize,
    base_hi: usize,
    head_lo: usize,
    head_hi: usize,
}

/// Greedily absorb following buffers while their base distance is within
/// the trailing context.
fn absorb_forward<R: std::io::Read + std::io::Seek>(
    engine: &QuickEngine<R>,
    start: usize,
    ctx_after: usize,
) -> usize {
    let bufs = engine.buffers();
    let mut end = start;
    while end + 1 < bufs.len() && base_distance(&bufs[end], &bufs[end + 1]) <= ctx_after as i64 {
        end += 1;
    }
    end
}

fn absorb_backward<R: std::io::Read + std::io::Seek>(
    engine: &QuickEngine<R>,
    end: usize,
    ctx_after: usize,
) -> usize {
    let bufs = engine.buffers();
    let mut start = end;
    while start > 0 && base_distance(&bufs[start - 1], &bufs[start]) <= ctx_after as i64 {
        start -= 1;
    }
    start
}

/// Parse the line-range the user types at the comment prompt:
/// `<side><lo>[:<hi>]` with side `+` (head) or `-` (base).
pub fn parse_line_range(s: &str) -> Result<(Side, usize, usize)> {
    let s = s.trim();
    let side = match s.chars().next() {
        Some('+') => Side::Head,
        Some('-') => Side::Base,
        Some(c) => bail!("unexpected line type specifier {c:?} (+ or - are expected)"),
        None => bail!("empty line range"),
    };
    let rest = &s[1..];
    let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        bail!("expected a line number after the side specifier");
    }
    let lo: usize = rest[..digits].parse()?;
    let rest = &rest[digits..];

    let hi = if rest.is_empty() {
        lo
    } else {
        let Some(hi_str) = rest.strip_prefix(':') else {
            bail!(
                "unexpected line number separator {:?} (':' is expected)",
                rest.chars().next().unwrap()
            );
        };
        if hi_str.is_empty() || !hi_str.bytes().all(|b| b.is_ascii_digit()) {
            bail!("malformed line range end {hi_str:?}");
        }
        hi_str.parse()?
    };
    if hi < lo {
        bail!("line range end {hi} is before start {lo}");
    }
    Ok((side, lo, hi))
}

fn first_line(body: &str, width: usize) -> String {
    let line = body.lines().next().unwrap_or("");
    let budget = width.saturating_sub(20).max(20);
    if line.chars().count() > budget {
        let cut: String = line.chars().take(budget).collect();
        format!("{cut}...")
    } else {
        line.to_owned()
    }
}
