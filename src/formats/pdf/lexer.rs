//! Byte-level scanning helpers shared by the PDF stages.

use super::types::{is_delimiter, is_eol, is_whitespace};

/// A line starting at `start`: content range plus the offset after its
/// end-of-line bytes. Any run of CR/LF terminates the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub start: usize,
    pub end: usize,
    pub next: usize,
}

impl Line {
    pub fn bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.start..self.end]
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Read the line at `start`, `None` at end of data.
pub fn read_line(data: &[u8], start: usize) -> Option<Line> {
    if start >= data.len() {
        return None;
    }
    let end = data[start..]
        .iter()
        .position(|&b| is_eol(b))
        .map_or(data.len(), |p| start + p);
    let mut next = end;
    while next < data.len() && is_eol(data[next]) {
        next += 1;
    }
    Some(Line { start, end, next })
}

pub fn skip_whitespace(data: &[u8], mut pos: usize) -> usize {
    while pos < data.len() && is_whitespace(data[pos]) {
        pos += 1;
    }
    pos
}

/// End of the regular token starting at `pos`.
pub fn token_end(data: &[u8], mut pos: usize) -> usize {
    while pos < data.len() && !is_whitespace(data[pos]) && !is_delimiter(data[pos]) {
        pos += 1;
    }
    pos
}

pub fn is_digits(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(u8::is_ascii_digit)
}

/// Unsigned decimal value of `bytes`, `None` on a non-digit or overflow.
pub fn parse_decimal(bytes: &[u8]) -> Option<u64> {
    if !is_digits(bytes) {
        return None;
    }
    bytes.iter().try_fold(0u64, |acc, &b| {
        acc.checked_mul(10)?.checked_add(u64::from(b - b'0'))
    })
}

/// Two whitespace-separated unsigned integers at the start of `bytes`,
/// as in `"12 0 obj"` or an xref subsection line. Returns both values and
/// the offset just past the second.
pub fn parse_two_integers(bytes: &[u8]) -> Option<(u64, u64, usize)> {
    let p = skip_whitespace(bytes, 0);
    let end1 = p + bytes[p..].iter().take_while(|b| b.is_ascii_digit()).count();
    let first = parse_decimal(&bytes[p..end1])?;
    let p = skip_whitespace(bytes, end1);
    if p == end1 {
        return None;
    }
    let end2 = p + bytes[p..].iter().take_while(|b| b.is_ascii_digit()).count();
    let second = parse_decimal(&bytes[p..end2])?;
    Some((first, second, end2))
}
