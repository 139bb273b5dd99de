//! PDF object model and constants

use crate::tree::NodeId;
use once_cell::unsync::OnceCell;
use std::fmt;

/// "%PDF-M.m" plus the end-of-line byte
pub const HEADER_SIZE: usize = 10;
pub const HEADER_MAGIC: &[u8] = b"%PDF-";
/// `startxref\nN\n%%EOF\n`
pub const TRAILER_MIN_SIZE: usize = 18;

pub const KW_EOF: &[u8] = b"%%EOF";
pub const KW_STARTXREF: &[u8] = b"startxref";
pub const KW_TRAILER: &[u8] = b"trailer";
pub const KW_XREF: &[u8] = b"xref";
pub const KW_OBJ: &[u8] = b"obj";
pub const KW_ENDOBJ: &[u8] = b"endobj";
pub const KW_STREAM: &[u8] = b"stream";
pub const KW_ENDSTREAM: &[u8] = b"endstream";

/// Length of a classic xref entry line without its end-of-line bytes.
pub const XREF_ENTRY_LEN: usize = 18;

pub fn is_whitespace(b: u8) -> bool {
    matches!(b, 0x00 | 0x09 | 0x0a | 0x0c | 0x0d | 0x20)
}

pub fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

pub fn is_eol(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

/// Header version `major.minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfVersion {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Object number and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub number: u32,
    pub generation: u16,
}

impl ObjectKey {
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.generation)
    }
}

/// Dictionary with unique keys in first-insertion order. Re-inserting a key
/// replaces its value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfDictionary {
    entries: Vec<(String, PdfObject)>,
}

impl PdfDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: PdfObject) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// First present key among `keys`, for abbreviated aliases like `DP`.
    pub fn get_any(&self, keys: &[&str]) -> Option<&PdfObject> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PdfObject::as_integer)
    }

    pub fn name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PdfObject::as_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PdfObject)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Result of running a stream through its filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedStream {
    pub data: Vec<u8>,
    /// False when a filter or predictor stopped early
    pub complete: bool,
}

/// Raw stream bytes with a lazily filled decode cache.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    /// File offset of the first data byte
    pub offset: u64,
    pub data: Vec<u8>,
    decoded: OnceCell<DecodedStream>,
}

impl PdfStream {
    pub fn new(offset: u64, data: Vec<u8>) -> Self {
        Self {
            offset,
            data,
            decoded: OnceCell::new(),
        }
    }

    pub fn decoded(&self) -> Option<&DecodedStream> {
        self.decoded.get()
    }

    pub fn decoded_or_init(&self, f: impl FnOnce() -> DecodedStream) -> &DecodedStream {
        self.decoded.get_or_init(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(String),
    /// Raw bytes between the parentheses, escapes left in place
    LiteralString(Vec<u8>),
    /// Decoded bytes
    HexString(Vec<u8>),
    Reference(ObjectKey),
    Array(Vec<PdfObject>),
    Dictionary(PdfDictionary),
    Stream(PdfStream),
}

impl PdfObject {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PdfObject::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PdfObject::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PdfObject]> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PdfObject::Null => "null",
            PdfObject::Boolean(_) => "boolean",
            PdfObject::Integer(_) => "integer",
            PdfObject::Real(_) => "real",
            PdfObject::Name(_) => "name",
            PdfObject::LiteralString(_) => "literal string",
            PdfObject::HexString(_) => "hex string",
            PdfObject::Reference(_) => "reference",
            PdfObject::Array(_) => "array",
            PdfObject::Dictionary(_) => "dictionary",
            PdfObject::Stream(_) => "stream",
        }
    }
}

/// Location of an `n g obj ... endobj` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndirectHeader {
    pub key: ObjectKey,
    pub offset: u64,
    /// Bytes from `offset` through `endobj`
    pub length: u64,
    /// File offset of the body between `obj` and `endobj`
    pub data_offset: u64,
    pub data_len: u64,
}

/// A parsed indirect object.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    pub header: IndirectHeader,
    pub dict: Option<PdfDictionary>,
    pub stream: Option<PdfStream>,
    /// A bare value with no enclosing dictionary
    pub object: Option<PdfObject>,
    pub node: NodeId,
}
