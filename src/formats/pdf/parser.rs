//! Object body parser
//!
//! Tokenizes the bytes of one object body (or a trailer dictionary) and
//! rebuilds the value tree with an explicit container stack, so hostile
//! nesting costs heap frames up to `max_nesting_depth` rather than call
//! stack. Every value gets a tree node with its byte range; a dictionary
//! value hangs below the node of its key.
//!
//! Top-level results land in [`ParsedBody`]: the first dictionary, the
//! stream that follows it, and one other bare value.

use super::lexer::{is_digits, parse_decimal, skip_whitespace, token_end};
use super::types::{
    is_eol, is_whitespace, ObjectKey, PdfDictionary, PdfObject, PdfStream, KW_ENDSTREAM,
};
use crate::config::PdfConfig;
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::io::ByteSource;
use crate::tree::{NodeId, TreeSink};
use std::ops::Range;
use tracing::trace;

const ORIGIN: &str = "pdf::parser";

/// Resolves an indirect `Length` value for a stream.
pub trait LengthResolver {
    fn resolve_length(&mut self, key: ObjectKey, diag: &mut Diagnostics) -> Option<i64>;
}

/// Resolver for contexts where no object table exists yet.
pub struct NoResolver;

impl LengthResolver for NoResolver {
    fn resolve_length(&mut self, key: ObjectKey, diag: &mut Diagnostics) -> Option<i64> {
        diag.warn(
            DiagnosticKind::Structural,
            ORIGIN,
            format!("Cannot resolve stream Length reference {} R here", key),
        );
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBody {
    pub dict: Option<PdfDictionary>,
    pub stream: Option<PdfStream>,
    pub stream_node: Option<NodeId>,
    pub object: Option<PdfObject>,
    /// False when nesting was malformed or the parse stopped early
    pub complete: bool,
}

enum Frame {
    Dict {
        node: NodeId,
        start: usize,
        dict: PdfDictionary,
        key: Option<(String, NodeId)>,
    },
    Array {
        node: NodeId,
        start: usize,
        items: Vec<PdfObject>,
    },
}

/// Parser bound to one file's bytes.
pub struct BodyParser<'a> {
    data: &'a [u8],
    config: &'a PdfConfig,
}

impl<'a> BodyParser<'a> {
    pub fn new(data: &'a [u8], config: &'a PdfConfig) -> Self {
        Self { data, config }
    }

    /// Parse `range` of the file, hanging nodes below `parent`.
    pub fn parse(
        &self,
        range: Range<usize>,
        tree: &mut dyn TreeSink,
        parent: NodeId,
        resolver: &mut dyn LengthResolver,
        diag: &mut Diagnostics,
    ) -> ParsedBody {
        self.run(range, false, tree, parent, resolver, diag)
    }

    /// Like [`BodyParser::parse`], but stop once the first top-level
    /// dictionary closes. Used for trailers, whose end is not delimited.
    pub fn parse_dictionary(
        &self,
        range: Range<usize>,
        tree: &mut dyn TreeSink,
        parent: NodeId,
        diag: &mut Diagnostics,
    ) -> ParsedBody {
        self.run(range, true, tree, parent, &mut NoResolver, diag)
    }

    fn run(
        &self,
        range: Range<usize>,
        first_dict_only: bool,
        tree: &mut dyn TreeSink,
        parent: NodeId,
        resolver: &mut dyn LengthResolver,
        diag: &mut Diagnostics,
    ) -> ParsedBody {
        let end = range.end.min(self.data.len());
        let mut run = Run {
            data: &self.data[..end],
            config: self.config,
            pos: range.start,
            top: parent,
            stack: Vec::new(),
            out: ParsedBody {
                complete: true,
                ..ParsedBody::default()
            },
            halted: false,
            first_dict_only,
            tree,
            resolver,
            diag,
        };
        run.go();
        run.out
    }
}

struct Run<'a, 't> {
    /// File bytes truncated at the end of the parsed range
    data: &'a [u8],
    config: &'a PdfConfig,
    pos: usize,
    top: NodeId,
    stack: Vec<Frame>,
    out: ParsedBody,
    halted: bool,
    first_dict_only: bool,
    tree: &'t mut dyn TreeSink,
    resolver: &'t mut dyn LengthResolver,
    diag: &'t mut Diagnostics,
}

impl Run<'_, '_> {
    fn go(&mut self) {
        while self.pos < self.data.len() && !self.halted {
            let b = self.data[self.pos];
            if is_whitespace(b) {
                self.pos += 1;
                continue;
            }
            let next = self.data.get(self.pos + 1).copied();
            match b {
                b'%' => {
                    while self.pos < self.data.len() && !is_eol(self.data[self.pos]) {
                        self.pos += 1;
                    }
                }
                b'<' if next == Some(b'<') => self.open_dict(),
                b'<' => self.hex_string(),
                b'>' if next == Some(b'>') => self.close_dict(),
                b'[' => self.open_array(),
                b']' => self.close_array(),
                b'(' => self.literal_string(),
                b'/' => self.name(),
                b'>' | b')' => {
                    self.spurious(b as char);
                    self.pos += 1;
                }
                // PostScript calculator braces carry no structure here
                b'{' | b'}' => self.pos += 1,
                _ => self.regular_token(),
            }
        }

        if !self.stack.is_empty() {
            self.diag.warn(
                DiagnosticKind::Structural,
                ORIGIN,
                format!(
                    "Containers remain on the container stack ({} open)",
                    self.stack.len()
                ),
            );
            self.out.complete = false;
        }
    }

    /// Node that the next value hangs below.
    fn parent(&self) -> NodeId {
        match self.stack.last() {
            None => self.top,
            Some(Frame::Array { node, .. }) => *node,
            Some(Frame::Dict {
                key: Some((_, key_node)),
                ..
            }) => *key_node,
            Some(Frame::Dict { node, .. }) => *node,
        }
    }

    fn value_node(&mut self, label: &str, start: usize, end: usize) -> NodeId {
        let parent = self.parent();
        self.tree
            .append_range(parent, label, start as u64, (end - start) as u64)
    }

    fn attach(&mut self, value: PdfObject) {
        if self.stack.is_empty() {
            return self.attach_top(value);
        }
        match self.stack.last_mut() {
            None => {}
            Some(Frame::Array { items, .. }) => items.push(value),
            Some(Frame::Dict { dict, key, .. }) => match key.take() {
                Some((k, _)) => dict.insert(k, value),
                None => self.diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!(
                        "Dictionary key must be a name, got {} at {:#x}",
                        value.type_name(),
                        self.pos
                    ),
                ),
            },
        }
    }

    fn attach_top(&mut self, value: PdfObject) {
        match value {
            PdfObject::Dictionary(d) if self.out.dict.is_none() => {
                self.out.dict = Some(d);
                self.halted = self.first_dict_only;
            }
            other if self.out.object.is_none() => self.out.object = Some(other),
            other => self.diag.warn(
                DiagnosticKind::Structural,
                ORIGIN,
                format!("Extra top-level {} ignored at {:#x}", other.type_name(), self.pos),
            ),
        }
    }

    fn push(&mut self, frame_for: impl FnOnce(NodeId, usize) -> Frame, label: &str) {
        if self.stack.len() >= self.config.max_nesting_depth {
            self.diag.error(
                DiagnosticKind::RecursionLimit,
                ORIGIN,
                format!(
                    "Nesting deeper than {} levels at {:#x}",
                    self.config.max_nesting_depth, self.pos
                ),
            );
            self.out.complete = false;
            self.halted = true;
            return;
        }
        let parent = self.parent();
        let node = self.tree.append_label(parent, label);
        self.stack.push(frame_for(node, self.pos));
    }

    fn open_dict(&mut self) {
        self.push(
            |node, start| Frame::Dict {
                node,
                start,
                dict: PdfDictionary::new(),
                key: None,
            },
            "Dictionary",
        );
        self.pos += 2;
    }

    fn open_array(&mut self) {
        self.push(
            |node, start| Frame::Array {
                node,
                start,
                items: Vec::new(),
            },
            "Array",
        );
        self.pos += 1;
    }

    fn close_dict(&mut self) {
        let end = self.pos + 2;
        self.pos = end;
        match self.stack.pop() {
            Some(Frame::Dict {
                node,
                start,
                dict,
                key,
            }) => {
                if let Some((k, _)) = key {
                    self.diag.warn(
                        DiagnosticKind::Structural,
                        ORIGIN,
                        format!("Dictionary key /{} has no value", k),
                    );
                }
                self.tree.set_ranges(node, vec![range(start, end)]);
                self.attach(PdfObject::Dictionary(dict));
            }
            other => {
                if let Some(frame) = other {
                    self.stack.push(frame);
                }
                self.spurious_str(">>");
            }
        }
    }

    fn close_array(&mut self) {
        let end = self.pos + 1;
        self.pos = end;
        match self.stack.pop() {
            Some(Frame::Array { node, start, items }) => {
                self.tree.set_ranges(node, vec![range(start, end)]);
                self.attach(PdfObject::Array(items));
            }
            other => {
                if let Some(frame) = other {
                    self.stack.push(frame);
                }
                self.spurious(']');
            }
        }
    }

    fn spurious(&mut self, c: char) {
        self.spurious_str(&c.to_string());
    }

    fn spurious_str(&mut self, s: &str) {
        self.diag.warn(
            DiagnosticKind::Structural,
            ORIGIN,
            format!("Spurious '{}' encountered at {:#x}", s, self.pos),
        );
    }

    fn name(&mut self) {
        let start = self.pos;
        let end = token_end(self.data, start + 1);
        let name = String::from_utf8_lossy(&self.data[start + 1..end]).into_owned();
        self.pos = end;

        let wants_key = matches!(self.stack.last(), Some(Frame::Dict { key: None, .. }));
        let node = self.value_node(&format!("Name: {}", name), start, end);
        if wants_key {
            if let Some(Frame::Dict { key, .. }) = self.stack.last_mut() {
                *key = Some((name, node));
            }
        } else {
            self.attach(PdfObject::Name(name));
        }
    }

    fn hex_string(&mut self) {
        let start = self.pos + 1;
        let Some(close) = self.data[start..].iter().position(|&b| b == b'>') else {
            self.diag.error(
                DiagnosticKind::Structural,
                ORIGIN,
                format!("Unterminated hex string at {:#x}", self.pos),
            );
            self.out.complete = false;
            self.halted = true;
            return;
        };
        let end = start + close;
        let data = self.data;
        let raw = &data[start..end];
        let (bytes, bad) = decode_hex(raw);
        if bad > 0 {
            self.diag.warn(
                DiagnosticKind::Structural,
                ORIGIN,
                format!("{} invalid characters in hex string at {:#x}", bad, start),
            );
        }
        let label = format!("Hex String: {}", String::from_utf8_lossy(raw));
        self.value_node(&label, start, end);
        self.pos = end + 1;
        self.attach(PdfObject::HexString(bytes));
    }

    fn literal_string(&mut self) {
        let start = self.pos + 1;
        let mut depth = 1usize;
        let mut p = start;
        while p < self.data.len() {
            match self.data[p] {
                b'\\' => p += 1,
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            p += 1;
        }
        if depth > 0 {
            self.diag.error(
                DiagnosticKind::Structural,
                ORIGIN,
                format!("Unterminated literal string at {:#x}", self.pos),
            );
            self.out.complete = false;
            self.halted = true;
            return;
        }
        let raw = self.data[start..p].to_vec();
        let label = format!("Literal String: {}", String::from_utf8_lossy(&raw));
        self.value_node(&label, start, p);
        self.pos = p + 1;
        self.attach(PdfObject::LiteralString(raw));
    }

    fn regular_token(&mut self) {
        let start = self.pos;
        let data = self.data;
        let end = token_end(data, start).max(start + 1);
        let token = &data[start..end];
        self.pos = end;

        let value = match token {
            b"stream" => return self.stream(end),
            b"null" => PdfObject::Null,
            b"true" => PdfObject::Boolean(true),
            b"false" => PdfObject::Boolean(false),
            _ => match parse_number(token) {
                Some(PdfObject::Integer(n)) => match self.reference_after(n, end) {
                    Some((key, ref_end)) => {
                        self.pos = ref_end;
                        self.value_node(&format!("Reference: {} R", key), start, ref_end);
                        self.attach(PdfObject::Reference(key));
                        return;
                    }
                    None => PdfObject::Integer(n),
                },
                Some(v) => v,
                None => {
                    self.diag.warn(
                        DiagnosticKind::Structural,
                        ORIGIN,
                        format!(
                            "Unknown token found: {} at {:#x}",
                            String::from_utf8_lossy(token),
                            start
                        ),
                    );
                    return;
                }
            },
        };

        let label = match &value {
            PdfObject::Null => "null".to_string(),
            PdfObject::Boolean(true) => "Boolean: True".to_string(),
            PdfObject::Boolean(false) => "Boolean: False".to_string(),
            PdfObject::Integer(n) => format!("Integer: {}", n),
            PdfObject::Real(r) => format!("Real: {}", r),
            other => other.type_name().to_string(),
        };
        self.value_node(&label, start, end);
        self.attach(value);
    }

    /// `n g R` lookahead after an integer token ending at `after`.
    fn reference_after(&self, number: i64, after: usize) -> Option<(ObjectKey, usize)> {
        let number = u32::try_from(number).ok()?;
        let g_start = skip_whitespace(self.data, after);
        if g_start == after {
            return None;
        }
        let g_end = token_end(self.data, g_start);
        let generation = u16::try_from(parse_decimal(&self.data[g_start..g_end])?).ok()?;
        let r_start = skip_whitespace(self.data, g_end);
        if r_start == g_end {
            return None;
        }
        let r_end = token_end(self.data, r_start);
        (&self.data[r_start..r_end] == b"R").then_some((ObjectKey::new(number, generation), r_end))
    }

    fn stream(&mut self, keyword_end: usize) {
        let mut start = keyword_end;
        if self.data.get(start) == Some(&b'\r') {
            start += 1;
        }
        if self.data.get(start) == Some(&b'\n') {
            start += 1;
        }

        let declared = if self.stack.is_empty() {
            self.declared_length()
        } else {
            None
        };
        let bounds = declared
            .and_then(|n| self.check_declared(start, n))
            .or_else(|| self.scan_for_endstream(start));
        let Some((data_end, resume)) = bounds else {
            self.diag.error(
                DiagnosticKind::Structural,
                ORIGIN,
                format!("Unterminated stream encountered at {:#x}", start),
            );
            self.out.complete = false;
            self.halted = true;
            return;
        };

        trace!(start, len = data_end - start, "stream data");
        let node = self.value_node("Stream Data", start, data_end);
        let stream = PdfStream::new(start as u64, self.data[start..data_end].to_vec());
        self.pos = resume;
        if self.stack.is_empty() && self.out.stream.is_none() {
            self.out.stream = Some(stream);
            self.out.stream_node = Some(node);
        } else {
            self.attach(PdfObject::Stream(stream));
        }
    }

    fn declared_length(&mut self) -> Option<i64> {
        let length = self
            .out
            .dict
            .as_ref()
            .and_then(|d| d.get("Length"))
            .cloned();
        match length {
            Some(PdfObject::Integer(n)) => Some(n),
            Some(PdfObject::Reference(key)) => self.resolver.resolve_length(key, self.diag),
            Some(other) => {
                self.diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!("Stream Length is a {}, not an integer", other.type_name()),
                );
                None
            }
            None => {
                self.diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    "Object does not contain \"Length\" key for stream",
                );
                None
            }
        }
    }

    /// Bounds for a declared length, `None` to fall back to scanning.
    fn check_declared(&mut self, start: usize, length: i64) -> Option<(usize, usize)> {
        let end = usize::try_from(length)
            .ok()
            .and_then(|n| start.checked_add(n))
            .filter(|&end| end <= self.data.len());
        let Some(end) = end else {
            self.diag.error(
                DiagnosticKind::Structural,
                ORIGIN,
                format!(
                    "Object \"Length\" key ({}) is greater than available data",
                    length
                ),
            );
            return None;
        };

        let after = skip_whitespace(self.data, end);
        if self.data[after..].starts_with(KW_ENDSTREAM) {
            return Some((end, after + KW_ENDSTREAM.len()));
        }
        if self.config.verify_stream_length {
            self.diag.warn(
                DiagnosticKind::Structural,
                ORIGIN,
                format!(
                    "Declared stream Length {} does not end at endstream",
                    length
                ),
            );
            return None;
        }
        let resume = self
            .data
            .find_forward(end as u64, KW_ENDSTREAM)
            .map_or(end, |p| p as usize + KW_ENDSTREAM.len());
        Some((end, resume))
    }

    fn scan_for_endstream(&mut self, start: usize) -> Option<(usize, usize)> {
        let kw = self.data.find_forward(start as u64, KW_ENDSTREAM)? as usize;
        let mut end = kw;
        if end > start && self.data[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && self.data[end - 1] == b'\r' {
            end -= 1;
        }
        self.diag.info(
            DiagnosticKind::Heuristic,
            ORIGIN,
            format!("Detected stream length to be {} bytes", end - start),
        );
        Some((end, kw + KW_ENDSTREAM.len()))
    }
}

fn range(start: usize, end: usize) -> crate::tree::ByteRange {
    crate::tree::ByteRange::new(start as u64, (end - start) as u64)
}

/// Integer or real token, `None` for anything else.
pub fn parse_number(token: &[u8]) -> Option<PdfObject> {
    let s = std::str::from_utf8(token).ok()?;
    let body = s.strip_prefix(|c| c == '+' || c == '-').unwrap_or(s);
    let dots = body.bytes().filter(|&b| b == b'.').count();
    if body.is_empty() || body == "." || dots > 1 {
        return None;
    }
    if !body.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    if dots == 0 && is_digits(body.as_bytes()) {
        if let Ok(n) = s.parse::<i64>() {
            return Some(PdfObject::Integer(n));
        }
    }
    s.parse::<f64>().ok().map(PdfObject::Real)
}

/// Decode hex digits, skipping whitespace. An odd final digit is the high
/// nibble of the last byte. Returns the bytes and the count of invalid
/// characters.
pub fn decode_hex(raw: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(raw.len() / 2 + 1);
    let mut high: Option<u8> = None;
    let mut bad = 0;
    for &c in raw {
        let nibble = match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            b'A'..=b'F' => c - b'A' + 10,
            c if is_whitespace(c) => continue,
            _ => {
                bad += 1;
                continue;
            }
        };
        match high.take() {
            Some(h) => out.push(h << 4 | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    (out, bad)
}
