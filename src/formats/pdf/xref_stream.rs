//! Compressed cross-reference streams (PDF 1.5+)

use super::filters;
use super::objects::{read_indirect, ObjectTable, TableResolver};
use super::parser::BodyParser;
use super::types::{ObjectKey, PdfDictionary, PdfObject};
use crate::config::PdfConfig;
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::{DissectError, Result};
use crate::formats::utils::read_be_uint;
use crate::timeout::IterationTimeout;
use crate::tree::{NodeId, TreeSink};
use std::collections::HashMap;
use tracing::debug;

const ORIGIN: &str = "pdf::xref_stream";

/// Widest supported field, in bytes.
pub const MAX_FIELD_WIDTH: i64 = 8;

/// Validated xref stream dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrefStreamLayout {
    pub size: u64,
    pub widths: [usize; 3],
    /// `(first object, count)` subsections
    pub index: Vec<(u64, u64)>,
}

impl XrefStreamLayout {
    pub fn row_size(&self) -> usize {
        self.widths.iter().sum()
    }

    pub fn row_count(&self) -> Option<u64> {
        self.index
            .iter()
            .try_fold(0u64, |acc, &(_, count)| acc.checked_add(count))
    }
}

fn invalid(msg: impl Into<String>) -> DissectError {
    DissectError::Validation(msg.into())
}

fn non_negative(obj: &PdfObject, what: &str) -> Result<u64> {
    obj.as_integer()
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| invalid(format!("xref stream {} must be a non-negative integer", what)))
}

/// Check the keys an xref stream dictionary must carry.
pub fn validate_dictionary(dict: &PdfDictionary) -> Result<XrefStreamLayout> {
    if dict.name("Type") != Some("XRef") {
        return Err(invalid("xref stream Type is not /XRef"));
    }
    let size = dict
        .get("Size")
        .ok_or_else(|| invalid("xref stream has no Size"))
        .and_then(|v| non_negative(v, "Size"))?;

    let w = dict
        .get("W")
        .and_then(PdfObject::as_array)
        .filter(|w| w.len() == 3)
        .ok_or_else(|| invalid("xref stream W must be an array of 3 integers"))?;
    let mut widths = [0usize; 3];
    for (slot, value) in widths.iter_mut().zip(w) {
        let width = value
            .as_integer()
            .ok_or_else(|| invalid("xref stream W must be an array of 3 integers"))?;
        if !(0..=MAX_FIELD_WIDTH).contains(&width) {
            return Err(invalid(format!(
                "xref stream field width {} outside 0..={}",
                width, MAX_FIELD_WIDTH
            )));
        }
        *slot = width as usize;
    }

    let index = match dict.get("Index") {
        None => vec![(0, size)],
        Some(PdfObject::Array(items)) if items.len() % 2 == 0 => items
            .chunks_exact(2)
            .map(|pair| -> Result<(u64, u64)> {
                Ok((non_negative(&pair[0], "Index")?, non_negative(&pair[1], "Index")?))
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => return Err(invalid("xref stream Index must be an array of integer pairs")),
    };

    if let Some(prev) = dict.get("Prev") {
        if prev.as_integer().is_none() {
            return Err(invalid("xref stream Prev must be an integer"));
        }
    }
    if let Some(parms) = dict.get_any(&["DecodeParms", "DP"]) {
        if parms.as_dict().is_none() && parms.as_array().is_none() {
            return Err(invalid("xref stream DecodeParms must be a dictionary"));
        }
    }
    Ok(XrefStreamLayout {
        size,
        widths,
        index,
    })
}

/// Dissect the xref stream object at `offset`, registering its in-use
/// entries. Returns the stream dictionary so its `Prev` can be followed.
#[allow(clippy::too_many_arguments)]
pub fn dissect_xref_stream(
    data: &[u8],
    offset: u64,
    config: &PdfConfig,
    table: &mut ObjectTable,
    tree: &mut dyn TreeSink,
    xref_node: NodeId,
    timer: &mut IterationTimeout,
    diag: &mut Diagnostics,
) -> Result<PdfDictionary> {
    let header = read_indirect(data, offset, None, diag).map_err(|_| {
        DissectError::structural(offset, "did not find an xref table or stream")
    })?;
    let node = tree.append_range(
        xref_node,
        &format!("Xref Stream - Object {}", header.key),
        header.offset,
        header.length,
    );

    let start = header.data_offset as usize;
    let end = start + header.data_len as usize;
    // an indirect Length can only point at objects earlier sections registered
    let mut lengths = HashMap::new();
    let mut resolver = TableResolver::new(data, table, config, &mut lengths);
    let body = BodyParser::new(data, config).parse(start..end, tree, node, &mut resolver, diag);
    let dict = body
        .dict
        .ok_or_else(|| invalid("xref stream object holds no dictionary"))?;
    let layout = validate_dictionary(&dict)?;
    let stream = body
        .stream
        .ok_or_else(|| invalid("xref stream object holds no stream"))?;
    let rows_parent = body.stream_node.unwrap_or(node);

    let decoded = filters::decoded(&stream, &dict, config, diag);
    tree.append_label(
        rows_parent,
        &format!("Decoded Length: {}", decoded.data.len()),
    );

    let row_size = layout.row_size();
    if row_size == 0 {
        return Err(invalid("xref stream rows have zero width"));
    }
    let declared = layout.row_count().ok_or_else(|| DissectError::ResourceExhausted {
        resource: "xref stream rows".into(),
        used: u64::MAX,
        limit: u64::MAX,
    })?;
    declared
        .checked_mul(row_size as u64)
        .ok_or_else(|| DissectError::ResourceExhausted {
            resource: "xref stream bytes".into(),
            used: declared,
            limit: u64::MAX / row_size as u64,
        })?;
    let available = (decoded.data.len() / row_size) as u64;
    if available < declared {
        diag.warn(
            DiagnosticKind::Structural,
            ORIGIN,
            format!(
                "Xref stream holds {} complete rows, {} declared",
                available, declared
            ),
        );
    }
    let beyond_size = layout
        .index
        .iter()
        .any(|&(first, count)| first.saturating_add(count) > layout.size);
    if beyond_size {
        diag.warn(
            DiagnosticKind::Structural,
            ORIGIN,
            format!("Xref stream Index reaches beyond Size {}", layout.size),
        );
    }

    let [w0, w1, w2] = layout.widths;
    let mut rows = decoded.data.chunks_exact(row_size);
    let mut registered = 0usize;
    'sections: for &(first, count) in &layout.index {
        for i in 0..count {
            let Some(row) = rows.next() else {
                break 'sections;
            };
            timer.check()?;
            let kind = if w0 == 0 { 1 } else { read_be_uint(&row[..w0]) };
            let f1 = read_be_uint(&row[w0..w0 + w1]);
            let f2 = read_be_uint(&row[w0 + w1..w0 + w1 + w2]);
            let Some(number) = first.checked_add(i).and_then(|n| u32::try_from(n).ok()) else {
                diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!("Xref stream object number {}+{} out of range", first, i),
                );
                break 'sections;
            };

            let label = match kind {
                0 => format!("Entry {}: Free, next {}, generation {}", number, f1, f2),
                1 => match u16::try_from(f2) {
                    Ok(generation) => {
                        if table.register(ObjectKey::new(number, generation), f1, diag) {
                            registered += 1;
                        }
                        format!("Entry {}: In-Use at {:#x}, generation {}", number, f1, f2)
                    }
                    Err(_) => {
                        diag.warn(
                            DiagnosticKind::Structural,
                            ORIGIN,
                            format!("Xref stream entry {} has generation {}", number, f2),
                        );
                        format!("Entry {}: In-Use at {:#x}, bad generation {}", number, f1, f2)
                    }
                },
                2 => format!(
                    "Entry {}: Compressed in object {}, index {}",
                    number, f1, f2
                ),
                other => format!("Entry {}: Unknown type {}", number, other),
            };
            tree.append_label(rows_parent, &label);
        }
    }
    debug!(key = %header.key, registered, "xref stream processed");
    Ok(dict)
}
