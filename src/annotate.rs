//! Annotation of a head-file snapshot with review discussion, and the
//! reverse translation of edits made against the annotated file.
//!
//! The annotator injects one framed block per commented line. The remapper
//! takes an edit command whose line numbers address the annotated file and
//! rewrites it against the unannotated head file, shifting past blocks and
//! clipping or splitting commands that overlap one. Edits strictly inside a
//! block are dropped: the injected discussion is not editable.

use crate::ed::{Command, Mode};
use crate::text;
use crate::vcs::{build_threads, Comment, Thread};

/// Width comment bodies are wrapped to inside annotation blocks.
pub const BODY_WIDTH: usize = 80;

const FRAME: &str = "******************************************************************************";

/// One annotation block as placed into the annotated file.
///
/// `line` is the 1-based first line of the block in the annotated file,
/// `size` its line count, and `extra` the total number of annotation lines
/// inserted before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentBlock {
    pub line: usize,
    pub size: usize,
    pub extra: usize,
}

impl CommentBlock {
    fn end(&self) -> usize {
        self.line + self.size - 1
    }
}

/// Render `comments` into `head`, producing the annotated text and the
/// list of placed blocks, sorted by line and non-overlapping.
pub fn annotate(head: &str, comments: &[Comment]) -> (String, Vec<CommentBlock>) {
    let threads = build_threads(comments);
    let mut out = String::with_capacity(head.len());
    let mut blocks = Vec::new();
    let mut extra = 0;
    let mut next = threads.iter().peekable();

    for (idx, line) in head.split_inclusive('\n').enumerate() {
        let lineno = idx + 1;
        out.push_str(line);
        if !line.ends_with('\n') {
            out.push('\n');
        }

        let mut block = String::new();
        while next.peek().map(|t| t.lines().0) == Some(lineno) {
            if block.is_empty() {
                block.push_str("/*");
                block.push_str(FRAME);
                block.push('\n');
            }
            render_thread(&mut block, next.next().unwrap());
        }
        if !block.is_empty() {
            block.push_str(FRAME);
            block.push_str("*/\n");
            let size = text::count_lines(&block);
            blocks.push(CommentBlock {
                line: lineno + extra + 1,
                size,
                extra,
            });
            extra += size;
            out.push_str(&block);
        }
    }
    (out, blocks)
}

fn render_thread(out: &mut String, t: &Thread) {
    for (i, c) in t.comments().iter().enumerate() {
        let mut part = String::new();
        let mut header = format!("@{} at {}", c.author, c.created_at.format("%b %e %H:%M:%S"));
        if c.updated_at != c.created_at {
            header.push_str(&format!(
                " (updated at {})",
                c.updated_at.format("%b %e %H:%M:%S")
            ));
        }
        part.push_str(&header);
        part.push('\n');
        part.push_str(&format!("#{}:\n", c.id));
        part.push_str(&"-".repeat(header.chars().count()));
        part.push('\n');
        for line in text::wrap(c.body.trim(), BODY_WIDTH) {
            part.push_str(&line);
            part.push('\n');
        }
        part.push('\n');

        if i > 0 {
            // Replies are indented below their root.
            out.push_str(&text::prefix_lines(&part, "    "));
        } else {
            out.push_str(&part);
        }
    }
}

/// Translate `cmd`, addressed against the annotated file described by
/// `blocks`, back onto the unannotated head file. Calls `apply` zero, one
/// or two times: overlap with a block drops the covered middle and may
/// leave a prefix piece, a suffix piece, or both.
pub fn remap_edit(blocks: &[CommentBlock], cmd: Command, mut apply: impl FnMut(Command)) {
    if blocks.is_empty() {
        apply(cmd);
        return;
    }

    // First block ending at or after the command start. Any earlier block
    // lies entirely before the command and only contributes to the shift.
    let i = blocks.partition_point(|b| b.end() < cmd.start);
    if i == blocks.len() {
        let last = blocks[i - 1];
        apply(shift(cmd, last.extra + last.size));
        return;
    }

    let b = blocks[i];
    if cmd.end < b.line {
        apply(shift(cmd, b.extra));
        return;
    }
    if cmd.mode == Mode::Add && cmd.start == b.end() {
        // An add names the line *after* which text goes, so the last line
        // of a block is a valid insertion point right below it.
        apply(shift(cmd, b.extra + b.size));
        return;
    }

    let prefix_lines = b.line.saturating_sub(cmd.start);
    if cmd.start < b.line {
        let mut c = cmd.clone();
        c.text = text::take_lines(&cmd.text, prefix_lines).to_owned();
        c.end = b.line - 1;
        apply(shift(c, b.extra));
    }
    if cmd.end > b.end() {
        let mut c = cmd.clone();
        c.text = text::skip_lines(&cmd.text, prefix_lines).to_owned();
        c.start = b.end() + 1;
        apply(shift(c, b.extra + b.size));
    }
}

fn shift(mut cmd: Command, back: usize) -> Command {
    cmd.start -= back;
    cmd.end -= back;
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::Side;
    use chrono::{TimeZone, Utc};

    fn comment(id: &str, parent: Option<&str>, line: usize, body: &str) -> Comment {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Comment {
            id: id.to_owned(),
            body: body.to_owned(),
            side: Side::Head,
            lo: line,
            hi: line,
            created_at: t,
            updated_at: t,
            author: "alice".to_owned(),
            parent_id: parent.map(str::to_owned),
        }
    }

    fn cmd(start: usize, end: usize, mode: Mode, text: &str) -> Command {
        Command {
            start,
            end,
            mode,
            text: text.to_owned(),
        }
    }

    fn remap_all(blocks: &[CommentBlock], c: Command) -> Vec<Command> {
        let mut out = Vec::new();
        remap_edit(blocks, c, |c| out.push(c));
        out
    }

    // Single comment, single body line: opener + header + id + rule + body
    // + blank + closer.
    const BLOCK_LINES: usize = 7;

    #[test]
    fn test_annotate_places_block_after_anchor_line() {
        let (annotated, blocks) = annotate("a\nb\nc\n", &[comment("1", None, 2, "hi")]);
        assert_eq!(blocks, vec![CommentBlock { line: 3, size: BLOCK_LINES, extra: 0 }]);
        assert_eq!(text::count_lines(&annotated), 3 + BLOCK_LINES);

        let lines: Vec<&str> = annotated.lines().collect();
        assert_eq!(lines[0], "a");
        assert_eq!(lines[1], "b");
        assert!(lines[2].starts_with("/*****"));
        assert!(lines[3].starts_with("@alice at "));
        assert_eq!(lines[4], "#1:");
        assert!(lines[5].chars().all(|c| c == '-'));
        assert_eq!(lines[6], "hi");
        assert!(lines[9].ends_with("*/"));
        assert_eq!(lines[2 + BLOCK_LINES], "c");
    }

    #[test]
    fn test_annotate_reply_indented() {
        let cs = vec![comment("1", None, 1, "root"), comment("2", Some("1"), 1, "reply")];
        let (annotated, blocks) = annotate("only\n", &cs);
        assert_eq!(blocks.len(), 1);
        assert!(annotated.contains("\n    #2:\n"));
        assert!(annotated.contains("\n    reply\n"));
    }

    #[test]
    fn test_annotate_two_threads_same_line_share_block() {
        let cs = vec![comment("1", None, 1, "x"), comment("2", None, 1, "y")];
        let (annotated, blocks) = annotate("only\n", &cs);
        assert_eq!(blocks.len(), 1);
        assert_eq!(annotated.matches("/*").count(), 1);
        assert_eq!(blocks[0].size, 1 + 5 + 5 + 1);
    }

    #[test]
    fn test_annotate_extra_accumulates_across_blocks() {
        let cs = vec![comment("1", None, 1, "x"), comment("2", None, 3, "y")];
        let (_, blocks) = annotate("a\nb\nc\nd\n", &cs);
        assert_eq!(blocks[0], CommentBlock { line: 2, size: BLOCK_LINES, extra: 0 });
        assert_eq!(
            blocks[1],
            CommentBlock { line: 3 + BLOCK_LINES + 1, size: BLOCK_LINES, extra: BLOCK_LINES }
        );
    }

    #[test]
    fn test_annotate_line_invariant() {
        // Head line H maps to annotated line H + extra of the last block at
        // or before it.
        let cs = vec![comment("1", None, 2, "hi")];
        let (annotated, blocks) = annotate("a\nb\nc\n", &cs);
        let b = blocks[0];
        let lines: Vec<&str> = annotated.lines().collect();
        // Head line 3 ("c") sits below the block.
        assert_eq!(lines[3 + b.size - 1], "c");
    }

    #[test]
    fn test_remap_no_blocks_is_identity() {
        let c = cmd(4, 4, Mode::Add, "z\n");
        assert_eq!(remap_all(&[], c.clone()), vec![c]);
    }

    #[test]
    fn test_remap_after_all_blocks_shifts_by_extra_plus_size() {
        // Block covers annotated lines 3..=9; annotated line 10 is head 3.
        let blocks = [CommentBlock { line: 3, size: 7, extra: 0 }];
        let out = remap_all(&blocks, cmd(10, 10, Mode::Add, "Z\n"));
        assert_eq!(out, vec![cmd(3, 3, Mode::Add, "Z\n")]);
    }

    #[test]
    fn test_remap_before_block_shifts_by_extra_only() {
        let blocks = [CommentBlock { line: 3, size: 7, extra: 0 }];
        let out = remap_all(&blocks, cmd(1, 1, Mode::Change, "A!\n"));
        assert_eq!(out, vec![cmd(1, 1, Mode::Change, "A!\n")]);

        // Second block: commands between the two shift by the first's size.
        let blocks = [
            CommentBlock { line: 2, size: 7, extra: 0 },
            CommentBlock { line: 12, size: 7, extra: 7 },
        ];
        let out = remap_all(&blocks, cmd(10, 10, Mode::Change, "q\n"));
        assert_eq!(out, vec![cmd(3, 3, Mode::Change, "q\n")]);
    }

    #[test]
    fn test_remap_add_at_block_last_line_is_insert_below() {
        let blocks = [CommentBlock { line: 3, size: 7, extra: 0 }];
        let out = remap_all(&blocks, cmd(9, 9, Mode::Add, "Z\n"));
        assert_eq!(out, vec![cmd(2, 2, Mode::Add, "Z\n")]);
    }

    #[test]
    fn test_remap_inside_block_is_dropped() {
        let blocks = [CommentBlock { line: 3, size: 7, extra: 0 }];
        assert!(remap_all(&blocks, cmd(4, 6, Mode::Change, "Q\n")).is_empty());
        assert!(remap_all(&blocks, cmd(3, 9, Mode::Delete, "")).is_empty());
    }

    #[test]
    fn test_remap_overlap_splits_into_prefix_and_suffix() {
        // Block covers annotated 3..=9 (head line 2 annotated with a
        // 7-line block); annotated 10..=12 are head 3..=5.
        let blocks = [CommentBlock { line: 3, size: 7, extra: 0 }];
        let out = remap_all(&blocks, cmd(2, 12, Mode::Change, "X\nY\n"));
        assert_eq!(
            out,
            vec![cmd(2, 2, Mode::Change, "X\n"), cmd(3, 5, Mode::Change, "Y\n")]
        );
        // The split pieces' text concatenates back to the original.
        assert_eq!(format!("{}{}", out[0].text, out[1].text), "X\nY\n");
    }

    #[test]
    fn test_remap_prefix_only_and_suffix_only() {
        let blocks = [CommentBlock { line: 3, size: 7, extra: 0 }];
        // Overlaps the block head only.
        let out = remap_all(&blocks, cmd(2, 4, Mode::Delete, ""));
        assert_eq!(out, vec![cmd(2, 2, Mode::Delete, "")]);
        // Starts inside, runs past the end.
        let out = remap_all(&blocks, cmd(8, 11, Mode::Delete, ""));
        assert_eq!(out, vec![cmd(3, 4, Mode::Delete, "")]);
    }

    // Apply ed commands to text; used to check the remap preservation
    // property end to end.
    fn apply_commands(src: &str, cmds: &[Command]) -> String {
        let mut lines: Vec<String> = src.lines().map(|l| format!("{l}\n")).collect();
        let mut sorted: Vec<&Command> = cmds.iter().collect();
        sorted.sort_by_key(|c| c.start);
        for c in sorted.iter().rev() {
            let new: Vec<String> = c.text.split_inclusive('\n').map(str::to_owned).collect();
            match c.mode {
                Mode::Add => {
                    lines.splice(c.start..c.start, new);
                }
                Mode::Change => {
                    lines.splice(c.start - 1..c.end, new);
                }
                Mode::Delete => {
                    lines.splice(c.start - 1..c.end, []);
                }
            }
        }
        lines.concat()
    }

    #[test]
    fn test_remap_preservation_outside_blocks() {
        let head = "a\nb\nc\n";
        let cs = vec![comment("1", None, 2, "hi")];
        let (annotated, blocks) = annotate(head, &cs);
        let b = blocks[0];

        // Edit strictly outside the block: change the line below it.
        let annotated_cmd = cmd(b.end() + 1, b.end() + 1, Mode::Change, "C!\n");
        let remapped = remap_all(&blocks, annotated_cmd.clone());
        assert_eq!(remapped, vec![cmd(3, 3, Mode::Change, "C!\n")]);

        let edited_head = apply_commands(head, &remapped);
        let edited_annotated = apply_commands(&annotated, &[annotated_cmd]);
        let stripped: String = edited_annotated
            .lines()
            .enumerate()
            .filter(|(i, _)| {
                let lineno = i + 1;
                lineno < b.line || lineno > b.end()
            })
            .map(|(_, l)| format!("{l}\n"))
            .collect();
        assert_eq!(stripped, edited_head);
    }
}
