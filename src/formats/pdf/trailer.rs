//! End-of-file trailer: `%%EOF`, `startxref` and the trailer dictionary.

use super::lexer::{parse_decimal, skip_whitespace};
use super::parser::BodyParser;
use super::types::{PdfDictionary, KW_EOF, KW_STARTXREF, KW_TRAILER, TRAILER_MIN_SIZE};
use crate::config::PdfConfig;
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::{DissectError, Result};
use crate::io::ByteSource;
use crate::tree::{NodeId, TreeSink};

const ORIGIN: &str = "pdf::trailer";

/// What the trailer scan found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrailerInfo {
    /// Primary xref offset, validated against the file length
    pub startxref: Option<u64>,
    pub dict: Option<PdfDictionary>,
    /// Byte range of the trailer dictionary, used to skip re-showing it
    pub dict_range: Option<(usize, usize)>,
}

/// Scan backward from the end of the file. Fails only for files too short
/// to hold a trailer.
pub fn parse_trailer(
    data: &[u8],
    config: &PdfConfig,
    tree: &mut dyn TreeSink,
    root: NodeId,
    diag: &mut Diagnostics,
) -> Result<TrailerInfo> {
    if data.len() < TRAILER_MIN_SIZE {
        return Err(DissectError::Validation(format!(
            "file of {} bytes is too short for a trailer",
            data.len()
        )));
    }
    let node = tree.append_label(root, "Trailer");
    let mut info = TrailerInfo::default();

    let tail_end = match data.find_backward(data.len() as u64, KW_EOF) {
        Some(pos) => {
            let pos = pos as usize;
            let distance = (data.len() - pos) as u64;
            if distance > config.eof_search_window {
                diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    format!(
                        "%%EOF found {} bytes before end of file, outside the last {}",
                        distance, config.eof_search_window
                    ),
                );
            }
            pos + KW_EOF.len()
        }
        None => {
            diag.warn(DiagnosticKind::Structural, ORIGIN, "Unable to locate %%EOF");
            data.len()
        }
    };

    let startxref = data
        .find_backward(tail_end as u64, KW_STARTXREF)
        .map(|p| p as usize);
    match startxref {
        Some(sx) => {
            let sx_node = tree.append_range(node, "startxref", sx as u64, (tail_end - sx) as u64);
            info.startxref = parse_startxref(data, sx, tail_end, tree, sx_node, diag);
        }
        None => diag.error(
            DiagnosticKind::Structural,
            ORIGIN,
            "Unable to locate startxref",
        ),
    }

    let dict_end = startxref.unwrap_or(tail_end);
    match data.find_backward(dict_end as u64, KW_TRAILER) {
        Some(tr) => {
            let tr = tr as usize;
            let start = tr + KW_TRAILER.len();
            tree.set_ranges(node, vec![crate::tree::ByteRange::new(
                tr as u64,
                (tail_end - tr) as u64,
            )]);
            let data_node = tree.append_range(node, "Data", start as u64, (dict_end - start) as u64);
            let body =
                BodyParser::new(data, config).parse_dictionary(start..dict_end, tree, data_node, diag);
            if body.dict.is_none() {
                diag.warn(
                    DiagnosticKind::Structural,
                    ORIGIN,
                    "Trailer holds no dictionary",
                );
            }
            info.dict = body.dict;
            info.dict_range = Some((start, dict_end));
        }
        None => diag.info(
            DiagnosticKind::Structural,
            ORIGIN,
            "No trailer dictionary was found",
        ),
    }

    if let Some(dict) = &info.dict {
        for key in ["XRefStm", "Prev"] {
            if let Some(off) = dict.integer(key) {
                if off < 0 || off as u64 >= data.len() as u64 {
                    diag.warn(
                        DiagnosticKind::Structural,
                        ORIGIN,
                        format!("Trailer {} value {:#x} is out of range", key, off),
                    );
                }
            }
        }
    }
    Ok(info)
}

fn parse_startxref(
    data: &[u8],
    sx: usize,
    tail_end: usize,
    tree: &mut dyn TreeSink,
    sx_node: NodeId,
    diag: &mut Diagnostics,
) -> Option<u64> {
    let start = skip_whitespace(data, sx + KW_STARTXREF.len()).min(tail_end);
    let len = data[start..tail_end]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    let Some(offset) = parse_decimal(&data[start..start + len]) else {
        diag.error(
            DiagnosticKind::Structural,
            ORIGIN,
            "startxref is not followed by an offset",
        );
        return None;
    };
    tree.append_range(
        sx_node,
        &format!("Offset: {:#x}", offset),
        start as u64,
        len as u64,
    );
    if offset >= data.len() as u64 {
        diag.error(
            DiagnosticKind::Structural,
            ORIGIN,
            format!("startxref offset {:#x} is beyond end of file", offset),
        );
        return None;
    }
    Some(offset)
}
