//! Stream filters
//!
//! Filters compose as a chain of [`Read`] adapters over the raw stream
//! bytes, so each stage only holds one buffer's worth of state. Only
//! `FlateDecode` is decoded; its PNG predictor support covers the Up
//! filter, which is what cross-reference streams use in practice.

use super::types::{DecodedStream, PdfDictionary, PdfObject, PdfStream};
use crate::config::PdfConfig;
use crate::diag::{DiagnosticKind, Diagnostics};
use flate2::read::ZlibDecoder;
use std::io::{self, ErrorKind, Read};
use tracing::debug;

const ORIGIN: &str = "pdf::filters";

/// PNG filter type byte for "Up"
pub const PNG_UP: u8 = 0x02;
/// Upper bound on one predictor row, guards absurd Columns values
const MAX_ROW_BYTES: u64 = 1 << 24;

/// Undoes the PNG Up predictor one scanline at a time.
///
/// Every row is a filter-type byte followed by `row_len` deltas against the
/// row above (zeros before the first row). A row tagged with anything other
/// than Up ends the stream with an `InvalidData` error after the rows
/// already produced.
pub struct PngUpReader<R> {
    inner: R,
    scanline: Vec<u8>,
    prior: Vec<u8>,
    pos: usize,
    filled: usize,
    done: bool,
}

impl<R: Read> PngUpReader<R> {
    pub fn new(inner: R, row_len: usize) -> Self {
        Self {
            inner,
            scanline: vec![0; row_len + 1],
            prior: vec![0; row_len],
            pos: 0,
            filled: 0,
            done: false,
        }
    }

    fn next_row(&mut self) -> io::Result<()> {
        let got = read_full(&mut self.inner, &mut self.scanline)?;
        if got == 0 {
            self.done = true;
            return Ok(());
        }
        let tag = self.scanline[0];
        if tag != PNG_UP {
            self.done = true;
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("unsupported PNG predictor tag {:#04x}", tag),
            ));
        }
        let n = got - 1;
        for (out, delta) in self.prior[..n].iter_mut().zip(&self.scanline[1..got]) {
            *out = out.wrapping_add(*delta);
        }
        self.pos = 0;
        self.filled = n;
        if got < self.scanline.len() {
            self.done = true;
        }
        Ok(())
    }
}

impl<R: Read> Read for PngUpReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.filled {
            if self.done {
                return Ok(0);
            }
            self.next_row()?;
        }
        let n = buf.len().min(self.filled - self.pos);
        buf[..n].copy_from_slice(&self.prior[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Fill `buf` unless the reader ends first. Returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut got = 0;
    while got < buf.len() {
        match reader.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(got)
}

/// Filter names in application order.
fn filter_names(dict: &PdfDictionary, diag: &mut Diagnostics) -> Option<Vec<String>> {
    match dict.get("Filter") {
        None => Some(Vec::new()),
        Some(PdfObject::Name(n)) => Some(vec![n.clone()]),
        Some(PdfObject::Array(items)) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                match item.as_name() {
                    Some(n) => names.push(n.to_string()),
                    None => {
                        diag.warn(
                            DiagnosticKind::Structural,
                            ORIGIN,
                            format!("Filter array holds a {}", item.type_name()),
                        );
                        return None;
                    }
                }
            }
            Some(names)
        }
        Some(other) => {
            diag.warn(
                DiagnosticKind::Structural,
                ORIGIN,
                format!("Filter is a {}, expected a name or array", other.type_name()),
            );
            None
        }
    }
}

/// Decode parameters per filter, aligned with [`filter_names`].
fn filter_parms(dict: &PdfDictionary, count: usize) -> Vec<Option<&PdfDictionary>> {
    match dict.get_any(&["DecodeParms", "DP"]) {
        Some(PdfObject::Dictionary(d)) => {
            let mut parms = vec![None; count.max(1)];
            parms[0] = Some(d);
            parms
        }
        Some(PdfObject::Array(items)) => items.iter().map(PdfObject::as_dict).collect(),
        _ => Vec::new(),
    }
}

fn with_predictor<'r>(
    reader: Box<dyn Read + 'r>,
    parms: &PdfDictionary,
    complete: &mut bool,
    diag: &mut Diagnostics,
) -> Box<dyn Read + 'r> {
    let predictor = parms.integer("Predictor").unwrap_or(1);
    match predictor {
        1 => reader,
        10..=15 => {
            if predictor != 12 {
                diag.warn(
                    DiagnosticKind::Unsupported,
                    ORIGIN,
                    format!("PNG predictor {} decoded as Up", predictor),
                );
            }
            let columns = parms.integer("Columns").unwrap_or(1);
            let colors = parms.integer("Colors").unwrap_or(1);
            let bits = parms.integer("BitsPerComponent").unwrap_or(8);
            let row_bits = columns
                .checked_mul(colors)
                .and_then(|v| v.checked_mul(bits))
                .and_then(|v| u64::try_from(v).ok())
                .filter(|&v| v > 0);
            match row_bits.map(|b| b.div_ceil(8)).filter(|&b| b <= MAX_ROW_BYTES) {
                Some(row_len) => Box::new(PngUpReader::new(reader, row_len as usize)),
                None => {
                    diag.warn(
                        DiagnosticKind::Validation,
                        ORIGIN,
                        format!(
                            "Invalid predictor row geometry: Columns {} Colors {} BitsPerComponent {}",
                            columns, colors, bits
                        ),
                    );
                    *complete = false;
                    reader
                }
            }
        }
        other => {
            diag.warn(
                DiagnosticKind::Unsupported,
                ORIGIN,
                format!("Predictor {} is not supported", other),
            );
            *complete = false;
            reader
        }
    }
}

/// Run `raw` through the filters named in `dict`.
///
/// Decoding stops at the first unsupported filter or corrupt input and
/// keeps what was produced up to that point; `complete` says whether the
/// whole chain ran.
pub fn decode_stream(
    dict: &PdfDictionary,
    raw: &[u8],
    config: &PdfConfig,
    diag: &mut Diagnostics,
) -> DecodedStream {
    let Some(filters) = filter_names(dict, diag) else {
        return DecodedStream {
            data: raw.to_vec(),
            complete: false,
        };
    };
    let parms = filter_parms(dict, filters.len());

    let mut complete = true;
    let mut reader: Box<dyn Read + '_> = Box::new(raw);
    for (i, name) in filters.iter().enumerate() {
        match name.as_str() {
            "FlateDecode" | "Fl" => reader = Box::new(ZlibDecoder::new(reader)),
            other => {
                diag.warn(
                    DiagnosticKind::Unsupported,
                    ORIGIN,
                    format!("Unsupported filter {}", other),
                );
                complete = false;
                break;
            }
        }
        if let Some(p) = parms.get(i).copied().flatten() {
            reader = with_predictor(reader, p, &mut complete, diag);
        }
    }

    let limit = config.max_decoded_size;
    let mut data = Vec::new();
    if let Err(e) = reader.take(limit.saturating_add(1)).read_to_end(&mut data) {
        diag.warn(
            DiagnosticKind::Structural,
            ORIGIN,
            format!("Stream decoding stopped after {} bytes: {}", data.len(), e),
        );
        complete = false;
    }
    if data.len() as u64 > limit {
        data.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        diag.warn(
            DiagnosticKind::Resource,
            ORIGIN,
            format!("Decoded stream truncated at {} bytes", limit),
        );
        complete = false;
    }
    debug!(raw = raw.len(), decoded = data.len(), complete, "stream decoded");
    DecodedStream { data, complete }
}

/// Decode once and cache the result on the stream.
pub fn decoded<'s>(
    stream: &'s PdfStream,
    dict: &PdfDictionary,
    config: &PdfConfig,
    diag: &mut Diagnostics,
) -> &'s DecodedStream {
    stream.decoded_or_init(|| decode_stream(dict, &stream.data, config, diag))
}
