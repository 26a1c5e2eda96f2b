//! Random access by line number over a seekable byte stream.
//!
//! Byte offsets of line starts are learned lazily: seeking to a line that
//! has not been visited yet scans forward from the closest indexed
//! predecessor, recording every newly discovered line on the way. The index
//! never shrinks.

use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

pub struct LineSeeker<R: Read + Seek> {
    src: BufReader<R>,
    // 0-based line number -> byte offset of its first byte.
    index: BTreeMap<usize, u64>,
}

impl<R: Read + Seek> LineSeeker<R> {
    pub fn new(src: R) -> Self {
        Self {
            src: BufReader::new(src),
            index: BTreeMap::new(),
        }
    }

    /// Position the stream at the start of 0-based line `i`.
    ///
    /// Fails with `UnexpectedEof` if the stream has fewer than `i` lines.
    pub fn seek_line(&mut self, i: usize) -> io::Result<()> {
        if i == 0 {
            return self.seek(0);
        }
        if let Some(&offset) = self.index.get(&i) {
            return self.seek(offset);
        }
        let offset = self.scroll(i)?;
        self.seek(offset)
    }

    /// Read the next complete line, without its terminator. Returns `None`
    /// at end of input; data and `None` are never combined in one call.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        let n = self.src.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Whether 0-based line `i` exists in the stream.
    pub fn has_line(&mut self, i: usize) -> bool {
        match self.seek_line(i) {
            Ok(()) => matches!(self.read_line(), Ok(Some(_))),
            Err(_) => false,
        }
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.src.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    // Scan forward from the closest indexed line before `i`, indexing every
    // line discovered on the way, and return the offset of line `i`.
    fn scroll(&mut self, i: usize) -> io::Result<u64> {
        let (mut line, mut offset) = self
            .index
            .range(..i)
            .next_back()
            .map(|(&l, &o)| (l, o))
            .unwrap_or((0, 0));
        self.seek(offset)?;
        let mut buf = Vec::new();
        while line < i {
            buf.clear();
            let n = self.src.read_until(b'\n', &mut buf)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("line {i} is past the end of the stream"),
                ));
            }
            offset += n as u64;
            line += 1;
            self.index.insert(line, offset);
        }
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn seeker(s: &str) -> LineSeeker<Cursor<Vec<u8>>> {
        LineSeeker::new(Cursor::new(s.as_bytes().to_vec()))
    }

    #[test]
    fn test_seek_line_zero_is_byte_zero() {
        let mut s = seeker("alpha\nbeta\n");
        s.seek_line(0).unwrap();
        assert_eq!(s.read_line().unwrap().as_deref(), Some("alpha"));
    }

    #[test]
    fn test_seek_forward_and_back() {
        let mut s = seeker("a\nbb\nccc\ndddd\n");
        s.seek_line(2).unwrap();
        assert_eq!(s.read_line().unwrap().as_deref(), Some("ccc"));
        s.seek_line(1).unwrap();
        assert_eq!(s.read_line().unwrap().as_deref(), Some("bb"));
        s.seek_line(3).unwrap();
        assert_eq!(s.read_line().unwrap().as_deref(), Some("dddd"));
    }

    #[test]
    fn test_sequential_reads_after_seek() {
        let mut s = seeker("one\ntwo\nthree\n");
        s.seek_line(1).unwrap();
        assert_eq!(s.read_line().unwrap().as_deref(), Some("two"));
        assert_eq!(s.read_line().unwrap().as_deref(), Some("three"));
        assert_eq!(s.read_line().unwrap(), None);
    }

    #[test]
    fn test_seek_past_end_fails() {
        let mut s = seeker("a\nb\n");
        assert!(s.seek_line(5).is_err());
        // The seeker stays usable after a failed seek.
        s.seek_line(0).unwrap();
        assert_eq!(s.read_line().unwrap().as_deref(), Some("a"));
    }

    #[test]
    fn test_last_line_without_newline() {
        let mut s = seeker("a\nb");
        s.seek_line(1).unwrap();
        assert_eq!(s.read_line().unwrap().as_deref(), Some("b"));
        assert_eq!(s.read_line().unwrap(), None);
    }

    #[test]
    fn test_has_line() {
        let mut s = seeker("x\ny\nz\n");
        assert!(s.has_line(0));
        assert!(s.has_line(2));
        assert!(!s.has_line(3));
        assert!(!s.has_line(17));
    }

    #[test]
    fn test_empty_stream() {
        let mut s = seeker("");
        s.seek_line(0).unwrap();
        assert_eq!(s.read_line().unwrap(), None);
        assert!(!s.has_line(0));
    }
}
