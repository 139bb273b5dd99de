//! Object table and indirect object reading

use super::lexer::{parse_two_integers, skip_whitespace};
use super::parser::{BodyParser, LengthResolver, NoResolver};
use super::types::{IndirectHeader, ObjectKey, PdfObject, KW_ENDOBJ, KW_OBJ};
use crate::config::PdfConfig;
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::{DissectError, Result};
use crate::io::ByteSource;
use crate::tree::{DiscardSink, NodeId};
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

const ORIGIN: &str = "pdf::objects";

/// In-use objects keyed by number and generation. The first registration
/// of a key is authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectTable {
    offsets: BTreeMap<ObjectKey, u64>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` at `offset`. Returns false when the key was already
    /// known; a different offset is reported and ignored.
    pub fn register(&mut self, key: ObjectKey, offset: u64, diag: &mut Diagnostics) -> bool {
        match self.offsets.get(&key) {
            None => {
                trace!(%key, offset, "object registered");
                self.offsets.insert(key, offset);
                true
            }
            Some(&first) => {
                if first != offset {
                    diag.warn(
                        DiagnosticKind::Structural,
                        ORIGIN,
                        format!(
                            "Object {} already defined at {:#x}, ignoring {:#x}",
                            key, first, offset
                        ),
                    );
                }
                false
            }
        }
    }

    pub fn offset(&self, key: ObjectKey) -> Option<u64> {
        self.offsets.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Entries in object number order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectKey, u64)> + '_ {
        self.offsets.iter().map(|(k, v)| (*k, *v))
    }
}

/// Locate the `n g obj ... endobj` block at `offset`. When `expected` is
/// given, a different header number warns.
pub fn read_indirect(
    data: &[u8],
    offset: u64,
    expected: Option<ObjectKey>,
    diag: &mut Diagnostics,
) -> Result<IndirectHeader> {
    if offset == 0 {
        return Err(DissectError::structural(0, "object offset 0 is not valid"));
    }
    let start = usize::try_from(offset)
        .ok()
        .filter(|&s| s < data.len())
        .ok_or_else(|| DissectError::structural(offset, "object offset beyond end of file"))?;

    let head = skip_whitespace(data, start);
    let (number, generation, end) = parse_two_integers(&data[head..])
        .ok_or_else(|| DissectError::structural(offset, "missing object number and generation"))?;
    let kw = skip_whitespace(data, head + end);
    if !data[kw..].starts_with(KW_OBJ) {
        return Err(DissectError::structural(offset, "missing obj keyword"));
    }
    let key = match (u32::try_from(number), u16::try_from(generation)) {
        (Ok(n), Ok(g)) => ObjectKey::new(n, g),
        _ => {
            return Err(DissectError::structural(
                offset,
                format!("object number {} {} out of range", number, generation),
            ))
        }
    };
    if let Some(want) = expected {
        if want != key {
            diag.warn(
                DiagnosticKind::Structural,
                ORIGIN,
                format!(
                    "Object at {:#x} is {}, xref says {}",
                    offset, key, want
                ),
            );
        }
    }

    let body = kw + KW_OBJ.len();
    let endobj = data
        .find_forward(body as u64, KW_ENDOBJ)
        .map(|p| p as usize)
        .ok_or_else(|| DissectError::structural(offset, format!("object {} has no endobj", key)))?;
    let end = endobj + KW_ENDOBJ.len();
    Ok(IndirectHeader {
        key,
        offset: head as u64,
        length: (end - head) as u64,
        data_offset: body as u64,
        data_len: (endobj - body) as u64,
    })
}

/// Resolves indirect stream lengths through the object table, caching
/// each answer.
pub struct TableResolver<'a> {
    data: &'a [u8],
    table: &'a ObjectTable,
    config: &'a PdfConfig,
    cache: &'a mut HashMap<ObjectKey, Option<i64>>,
}

impl<'a> TableResolver<'a> {
    pub fn new(
        data: &'a [u8],
        table: &'a ObjectTable,
        config: &'a PdfConfig,
        cache: &'a mut HashMap<ObjectKey, Option<i64>>,
    ) -> Self {
        Self {
            data,
            table,
            config,
            cache,
        }
    }

    fn lookup(&self, key: ObjectKey, diag: &mut Diagnostics) -> Option<i64> {
        let Some(offset) = self.table.offset(key) else {
            diag.warn(
                DiagnosticKind::Structural,
                ORIGIN,
                format!("Stream Length refers to unknown object {}", key),
            );
            return None;
        };
        let header = match read_indirect(self.data, offset, Some(key), diag) {
            Ok(h) => h,
            Err(e) => {
                diag.record(ORIGIN, &e);
                return None;
            }
        };
        let start = header.data_offset as usize;
        let end = start + header.data_len as usize;
        // the length object itself never needs another indirect lookup
        let body = BodyParser::new(self.data, self.config).parse(
            start..end,
            &mut DiscardSink,
            NodeId::default(),
            &mut NoResolver,
            diag,
        );
        match body.object {
            Some(PdfObject::Integer(n)) => Some(n),
            other => {
                diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!(
                        "Stream Length object {} is {}, not an integer",
                        key,
                        other.as_ref().map_or("empty", PdfObject::type_name)
                    ),
                );
                None
            }
        }
    }
}

impl LengthResolver for TableResolver<'_> {
    fn resolve_length(&mut self, key: ObjectKey, diag: &mut Diagnostics) -> Option<i64> {
        if let Some(cached) = self.cache.get(&key) {
            return *cached;
        }
        let value = self.lookup(key, diag);
        self.cache.insert(key, value);
        value
    }
}
