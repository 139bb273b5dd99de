//! `%PDF-M.m` header

use super::types::{is_eol, PdfVersion, HEADER_MAGIC, HEADER_SIZE};
use crate::diag::{DiagnosticKind, Diagnostics};
use crate::error::{DissectError, Result};
use crate::tree::{NodeId, TreeSink};

const ORIGIN: &str = "pdf::header";

/// Bytes up to and including the minor version digit.
const VERSION_END: usize = 8;

/// Check the header and add its nodes. Only a file too short to hold a
/// version fails; every other mismatch is a warning.
pub fn parse_header(
    data: &[u8],
    tree: &mut dyn TreeSink,
    root: NodeId,
    diag: &mut Diagnostics,
) -> Result<PdfVersion> {
    if data.len() < VERSION_END {
        return Err(DissectError::Validation(format!(
            "file of {} bytes is too short for a PDF header",
            data.len()
        )));
    }
    let hdr = &data[..HEADER_SIZE.min(data.len())];

    if !hdr.starts_with(HEADER_MAGIC) {
        diag.warn(
            DiagnosticKind::Validation,
            ORIGIN,
            format!(
                "Header does not start with %PDF-, got {:?}",
                String::from_utf8_lossy(&hdr[..HEADER_MAGIC.len()])
            ),
        );
    }
    if !hdr.get(VERSION_END).copied().is_some_and(is_eol) {
        diag.warn(
            DiagnosticKind::Validation,
            ORIGIN,
            "Header does not end with a newline",
        );
    }
    if hdr[6] != b'.' {
        diag.warn(
            DiagnosticKind::Validation,
            ORIGIN,
            "Header version is missing its '.' separator",
        );
    }

    let version = PdfVersion {
        major: hdr[5].wrapping_sub(b'0'),
        minor: hdr[7].wrapping_sub(b'0'),
    };
    if version.major != 1 {
        diag.warn(
            DiagnosticKind::Validation,
            ORIGIN,
            format!("Header major version is {}, expected 1", version.major),
        );
    }
    if version.minor > 7 {
        diag.warn(
            DiagnosticKind::Validation,
            ORIGIN,
            format!("Header minor version {} is out of range", version.minor),
        );
    }

    let node = tree.append_range(root, "Header", 0, (VERSION_END + 1).min(data.len()) as u64);
    tree.append_range(node, &format!("Version: {}", version), 5, 3);
    Ok(version)
}
