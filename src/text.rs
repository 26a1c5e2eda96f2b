//! Line-oriented text helpers shared by the annotator and the thread
//! printer: word wrapping, width measurement, prefixing, line slicing.

/// Wrap each logical line of `s` to at most `width` characters, breaking at
/// the last space before the limit when one exists and hard-breaking
/// otherwise. Returns the wrapped lines without terminators.
pub fn wrap(s: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for line in s.split('\n') {
        let mut rest: Vec<char> = line.chars().collect();
        loop {
            if rest.len() <= width {
                out.push(rest.iter().collect());
                break;
            }
            // A space just past the limit still allows a clean break at
            // the limit itself, so scan one character further.
            let head = &rest[..=width];
            let cut = match head.iter().rposition(|&c| c == ' ') {
                Some(i) if i > 0 => i,
                _ => width,
            };
            out.push(rest[..cut].iter().collect());
            // Skip the space the line broke at.
            let skip = if rest.get(cut) == Some(&' ') { cut + 1 } else { cut };
            rest = rest[skip..].to_vec();
        }
    }
    out
}

/// Width in characters of the widest line of `s`.
pub fn max_line_width(s: &str) -> usize {
    s.split('\n').map(|l| l.chars().count()).max().unwrap_or(0)
}

/// Prepend `prefix` to every line of `s`, preserving terminators.
pub fn prefix_lines(s: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_line_start = true;
    for ch in s.chars() {
        if at_line_start {
            out.push_str(prefix);
            at_line_start = false;
        }
        out.push(ch);
        if ch == '\n' {
            at_line_start = true;
        }
    }
    out
}

/// First `n` newline-terminated lines of `s`.
pub fn take_lines(s: &str, n: usize) -> &str {
    match nth_line_start(s, n) {
        Some(i) => &s[..i],
        None => s,
    }
}

/// `s` with its first `n` newline-terminated lines removed.
pub fn skip_lines(s: &str, n: usize) -> &str {
    match nth_line_start(s, n) {
        Some(i) => &s[i..],
        None => "",
    }
}

/// Number of newline-terminated lines in `s`.
pub fn count_lines(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

fn nth_line_start(s: &str, n: usize) -> Option<usize> {
    let mut at = 0;
    for _ in 0..n {
        match s[at..].find('\n') {
            Some(i) => at += i + 1,
            None => return None,
        }
    }
    Some(at)
}
