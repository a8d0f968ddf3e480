// Author: Dustin Pilgrim
// License: MIT

use eventline as el;

/// Longest status text kept, in bytes.
pub const CONTENT_MAX: usize = 1024;

/// Longest unterminated line buffered before it is thrown away.
pub const PARTIAL_MAX: usize = 4096;

/// Splits the left, center and right segments of a line.
pub const SEGMENT_SEPARATOR: char = '\x1f';

/// The status text currently on screen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Content {
    text: String,
}

impl Content {
    /// Keeps at most `CONTENT_MAX` bytes, cut on a char boundary.
    pub fn new(line: &str) -> Content {
        let line = line.trim_end_matches('\r');
        let mut end = line.len().min(CONTENT_MAX);
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        if end < line.len() {
            el::debug!(
                "bar.content truncated from={from} to={to}",
                from = line.len() as i64,
                to = end as i64
            );
        }

        Content {
            text: line[..end].to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// `[left, center, right]`; missing segments are empty, extra separators stay in `right`.
    pub fn segments(&self) -> [&str; 3] {
        let mut it = self.text.splitn(3, SEGMENT_SEPARATOR);
        let left = it.next().unwrap_or("");
        let center = it.next().unwrap_or("");
        let right = it.next().unwrap_or("");
        [left, center, right]
    }
}

/// Accumulates raw stdin bytes and hands back complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    partial: Vec<u8>,
    overflowed: bool,
}

impl LineBuffer {
    /// Feed one read. Returns the last complete line in it, if any.
    ///
    /// Earlier lines in the same chunk are superseded and dropped.
    pub fn push(&mut self, bytes: &[u8]) -> Option<String> {
        let mut last = None;

        for &b in bytes {
            if b == b'\n' {
                if self.overflowed {
                    self.overflowed = false;
                } else {
                    last = Some(String::from_utf8_lossy(&self.partial).into_owned());
                }
                self.partial.clear();
                continue;
            }

            if self.overflowed {
                continue;
            }
            self.partial.push(b);
            if self.partial.len() > PARTIAL_MAX {
                el::warn!(
                    "bar.input line longer than {max} bytes discarded",
                    max = PARTIAL_MAX as i64
                );
                self.partial.clear();
                self.overflowed = true;
            }
        }

        last
    }

    /// Bytes waiting for a newline.
    pub fn pending(&self) -> usize {
        self.partial.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_complete_line_wins() {
        let mut lb = LineBuffer::default();
        assert_eq!(lb.push(b"first\nsecond\n"), Some("second".to_string()));
        assert_eq!(lb.pending(), 0);
    }

    #[test]
    fn partial_lines_wait_for_their_newline() {
        let mut lb = LineBuffer::default();
        assert_eq!(lb.push(b"cpu 4"), None);
        assert_eq!(lb.pending(), 5);
        assert_eq!(lb.push(b"2%\nmem"), Some("cpu 42%".to_string()));
        assert_eq!(lb.pending(), 3);
    }

    #[test]
    fn empty_line_clears() {
        let mut lb = LineBuffer::default();
        assert_eq!(lb.push(b"\n"), Some(String::new()));
    }

    #[test]
    fn oversized_partial_is_dropped_up_to_its_newline() {
        let mut lb = LineBuffer::default();
        let long = vec![b'x'; PARTIAL_MAX + 10];

        assert_eq!(lb.push(&long), None);
        assert_eq!(lb.pending(), 0);
        assert_eq!(lb.push(b"tail of the long one\nok\n"), Some("ok".to_string()));
    }

    #[test]
    fn content_is_truncated_on_char_boundary() {
        let mut s = "a".repeat(CONTENT_MAX - 1);
        s.push('é');
        let c = Content::new(&s);
        assert_eq!(c.as_str().len(), CONTENT_MAX - 1);

        let c = Content::new(&"z".repeat(CONTENT_MAX * 2));
        assert_eq!(c.as_str().len(), CONTENT_MAX);
    }

    #[test]
    fn carriage_return_is_stripped() {
        assert_eq!(Content::new("vol 30%\r").as_str(), "vol 30%");
    }

    #[test]
    fn segments_split_on_unit_separator() {
        assert_eq!(Content::new("a\x1fb\x1fc").segments(), ["a", "b", "c"]);
        assert_eq!(Content::new("only").segments(), ["only", "", ""]);
        assert_eq!(Content::new("l\x1f\x1fr\x1fx").segments(), ["l", "", "r\x1fx"]);
    }
}
