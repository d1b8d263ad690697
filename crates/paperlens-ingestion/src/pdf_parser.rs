//! lopdf-based PDF text extraction.
//!
//! Output text is page-delimited so the chunker can split on page
//! boundaries:
//!
//! ```text
//! --- Page 1 ---
//! ...
//!
//! --- Page 2 ---
//! ...
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use lopdf::{Dictionary, Document, Object};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Marker that opens every page in extracted text.
pub const PAGE_MARKER: &str = "--- Page";

/// Document info dictionary entries we keep.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    /// All pages, including ones that yielded no text.
    pub num_pages: usize,
    pub metadata: PdfMetadata,
}

impl ExtractedText {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Extract text from every page of a PDF. Blocking; call through
/// `spawn_blocking` from async code.
pub fn extract_text(pdf_path: &Path) -> Result<ExtractedText> {
    let doc = Document::load(pdf_path)
        .with_context(|| format!("failed to open PDF {}", pdf_path.display()))?;

    let pages = doc.get_pages();
    let mut parts = Vec::with_capacity(pages.len());

    for &page_num in pages.keys() {
        match doc.extract_text(&[page_num]) {
            Ok(text) if !text.trim().is_empty() => {
                parts.push(format!("{PAGE_MARKER} {page_num} ---\n{}", text.trim_end()));
            }
            Ok(_) => debug!(page = page_num, "Blank page"),
            Err(e) => warn!(page = page_num, error = %e, "Page text extraction failed"),
        }
    }

    debug!(
        path = %pdf_path.display(),
        pages = pages.len(),
        pages_with_text = parts.len(),
        "PDF extracted"
    );

    Ok(ExtractedText {
        text: parts.join("\n\n"),
        num_pages: pages.len(),
        metadata: read_info(&doc),
    })
}

fn read_info(doc: &Document) -> PdfMetadata {
    let info: Option<&Dictionary> = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    let Some(info) = info else {
        return PdfMetadata::default();
    };

    PdfMetadata {
        title:   info_string(info, b"Title"),
        author:  info_string(info, b"Author"),
        subject: info_string(info, b"Subject"),
        creator: info_string(info, b"Creator"),
    }
}

fn info_string(info: &Dictionary, key: &[u8]) -> Option<String> {
    match info.get(key).ok()? {
        Object::String(bytes, _) => {
            let s = decode_pdf_string(bytes);
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        _ => None,
    }
}

/// Info strings are either UTF-16BE with a byte-order mark or a single-byte
/// encoding; the latter is read as lossy UTF-8.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xFE_u8, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}
