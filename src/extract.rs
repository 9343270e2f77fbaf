//! PDF text extraction.
//!
//! Two strategies, chosen per request by `parser_type`:
//!
//! | Parser | Crate | Behaviour |
//! |--------|-------|-----------|
//! | `default` | `pdf-extract` | Whole-document text in one pass |
//! | `advanced` | `lopdf` | Page by page; each page's text followed by `\n`, empty pages skipped |
//!
//! Extraction never panics out of this module: malformed PDFs that make a
//! parser panic are reported as [`ExtractError::Pdf`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unknown parser type: '{0}' (expected 'default' or 'advanced')")]
    UnknownParser(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    Default,
    Advanced,
}

impl ParserKind {
    pub fn parse(s: &str) -> Result<Self, ExtractError> {
        match s {
            "default" => Ok(ParserKind::Default),
            "advanced" => Ok(ParserKind::Advanced),
            other => Err(ExtractError::UnknownParser(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParserKind::Default => "default",
            ParserKind::Advanced => "advanced",
        }
    }
}

impl FromStr for ParserKind {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParserKind::parse(s)
    }
}

/// Extract plain text from PDF bytes.
pub fn extract_pdf_text(bytes: &[u8], parser: ParserKind) -> Result<String, ExtractError> {
    let result = catch_unwind(AssertUnwindSafe(|| match parser {
        ParserKind::Default => extract_whole(bytes),
        ParserKind::Advanced => extract_by_page(bytes),
    }));
    match result {
        Ok(r) => r,
        Err(_) => Err(ExtractError::Pdf("parser panicked on malformed input".to_string())),
    }
}

fn extract_whole(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_by_page(bytes: &[u8]) -> Result<String, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let mut out = String::new();
    for page_number in doc.get_pages().keys() {
        // A page whose content stream cannot be decoded contributes nothing.
        let text = match doc.extract_text(&[*page_number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(page = page_number, error = %e, "page has no extractable text");
                continue;
            }
        };
        if text.trim().is_empty() {
            continue;
        }
        out.push_str(&text);
        out.push('\n');
    }
    Ok(out)
}
