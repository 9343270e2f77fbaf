//! The `pdf_parser` tool: PDF → text → sentence chunks.
//!
//! | Function | Purpose |
//! |----------|---------|
//! | `parse_pdf` | Extract and chunk one PDF file |
//! | `parse_folder` | Best-effort `parse_pdf` over every `*.pdf` directly inside a folder |
//!
//! Folder parsing never fails because of an individual file: a file that
//! cannot be read, parsed, or chunked is logged, listed under `skipped`, and
//! left out of `total_files` / `total_chunks`.

use globset::{Glob, GlobMatcher};
use rag_harness_core::chunk::chunk_text;
use rag_harness_core::RagError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::ChunkingConfig;
use crate::extract::{extract_pdf_text, ParserKind};
use crate::traits::{decode_inputs, error_payload, into_payload, CallError, Tool};

const FUNCTIONS: &[&str] = &["parse_pdf", "parse_folder"];

#[derive(Debug, Clone, Serialize)]
pub struct PdfMetadata {
    pub file_size: u64,
    pub parser_type: String,
    pub chunk_size: usize,
}

/// Result of parsing one PDF.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedPdf {
    pub success: bool,
    pub file_name: String,
    pub total_chunks: usize,
    pub chunks: Vec<String>,
    pub metadata: PdfMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub file_name: String,
    pub error: String,
}

/// Aggregate of a folder run. Counts cover successful files only.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FolderReport {
    pub success: bool,
    pub total_files: usize,
    pub total_chunks: usize,
    pub files: Vec<ParsedPdf>,
    pub skipped: Vec<SkippedFile>,
}

impl FolderReport {
    fn record(&mut self, file_name: String, outcome: Result<ParsedPdf, RagError>) {
        match outcome {
            Ok(parsed) => {
                self.total_files += 1;
                self.total_chunks += parsed.total_chunks;
                self.files.push(parsed);
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "skipping PDF");
                self.skipped.push(SkippedFile {
                    file_name,
                    error: e.to_string(),
                });
            }
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn positive_chunk_size(chunk_size: i64) -> Result<usize, RagError> {
    usize::try_from(chunk_size)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| RagError::invalid("chunk_size must be a positive integer"))
}

/// Read, extract, and chunk a single PDF.
pub fn parse_pdf(path: &Path, parser: ParserKind, chunk_size: usize) -> Result<ParsedPdf, RagError> {
    let bytes = std::fs::read(path)
        .map_err(|e| RagError::Resource(format!("cannot read {}: {}", path.display(), e)))?;

    let text =
        extract_pdf_text(&bytes, parser).map_err(|e| RagError::Resource(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(RagError::NoExtractableContent);
    }

    let chunks = chunk_text(&text, chunk_size)?;
    Ok(ParsedPdf {
        success: true,
        file_name: file_name_of(path),
        total_chunks: chunks.len(),
        chunks: chunks.into_iter().map(|c| c.text).collect(),
        metadata: PdfMetadata {
            file_size: bytes.len() as u64,
            parser_type: parser.as_str().to_string(),
            chunk_size,
        },
    })
}

/// List `*.pdf` files directly inside `folder`, sorted by file name.
fn list_pdfs(folder: &Path) -> Result<Vec<std::path::PathBuf>, RagError> {
    let matcher: GlobMatcher = Glob::new("*.pdf")
        .map_err(|e| RagError::Resource(e.to_string()))?
        .compile_matcher();

    let mut pdfs = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "unreadable folder entry");
                continue;
            }
        };
        if entry.file_type().is_file() && matcher.is_match(entry.file_name()) {
            pdfs.push(entry.into_path());
        }
    }
    Ok(pdfs)
}

/// Parse every PDF in a folder, collecting successes and skipping failures.
///
/// # Errors
///
/// Only for the folder as a whole: the path is not a directory, or it holds
/// no PDF files.
pub fn parse_folder(
    folder: &Path,
    parser: ParserKind,
    chunk_size: usize,
) -> Result<FolderReport, RagError> {
    if !folder.is_dir() {
        return Err(RagError::Resource("Invalid folder path".to_string()));
    }

    let pdfs = list_pdfs(folder)?;
    if pdfs.is_empty() {
        return Err(RagError::Resource("No PDF files found in folder".to_string()));
    }

    let mut report = FolderReport {
        success: true,
        ..Default::default()
    };
    for path in &pdfs {
        report.record(file_name_of(path), parse_pdf(path, parser, chunk_size));
    }
    info!(
        folder = %folder.display(),
        parsed = report.total_files,
        skipped = report.skipped.len(),
        chunks = report.total_chunks,
        "folder parsed"
    );
    Ok(report)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParsePdfInputs {
    pdf_path: String,
    #[serde(default)]
    parser_type: Option<String>,
    #[serde(default)]
    chunk_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParseFolderInputs {
    folder_path: String,
    #[serde(default)]
    parser_type: Option<String>,
    #[serde(default)]
    chunk_size: Option<i64>,
}

pub struct PdfParserTool {
    default_parser: String,
    default_chunk_size: usize,
}

impl PdfParserTool {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            default_parser: config.parser_type.clone(),
            default_chunk_size: config.chunk_size,
        }
    }

    fn options(
        &self,
        parser_type: Option<String>,
        chunk_size: Option<i64>,
    ) -> Result<(ParserKind, usize), RagError> {
        let parser_type = parser_type.unwrap_or_else(|| self.default_parser.clone());
        let parser =
            ParserKind::parse(&parser_type).map_err(|e| RagError::invalid(e.to_string()))?;
        let chunk_size = match chunk_size {
            Some(n) => positive_chunk_size(n)?,
            None => self.default_chunk_size,
        };
        Ok((parser, chunk_size))
    }

    fn run_parse_pdf(&self, inputs: ParsePdfInputs) -> Value {
        let result = self
            .options(inputs.parser_type, inputs.chunk_size)
            .and_then(|(parser, size)| parse_pdf(Path::new(&inputs.pdf_path), parser, size));
        match result {
            Err(RagError::NoExtractableContent) => error_payload("No text extracted from PDF"),
            other => into_payload(other, "Failed to parse PDF"),
        }
    }

    fn run_parse_folder(&self, inputs: ParseFolderInputs) -> Value {
        let result = self
            .options(inputs.parser_type, inputs.chunk_size)
            .and_then(|(parser, size)| parse_folder(Path::new(&inputs.folder_path), parser, size));
        match result {
            Err(RagError::Resource(msg)) => error_payload(msg),
            other => into_payload(other, "Failed to parse folder"),
        }
    }
}

impl Tool for PdfParserTool {
    fn name(&self) -> &str {
        "pdf_parser"
    }

    fn description(&self) -> &str {
        "Extract text from PDF files and split it into sentence chunks"
    }

    fn functions(&self) -> &[&'static str] {
        FUNCTIONS
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pdf_path": { "type": "string", "description": "PDF file path (parse_pdf)" },
                "folder_path": { "type": "string", "description": "Folder of PDF files (parse_folder)" },
                "parser_type": {
                    "type": "string",
                    "enum": ["default", "advanced"],
                    "default": self.default_parser,
                    "description": "Parser type"
                },
                "chunk_size": {
                    "type": "integer",
                    "default": self.default_chunk_size,
                    "description": "Number of sentences per chunk"
                }
            }
        })
    }

    fn call(&mut self, function: &str, inputs: Value) -> Result<Value, CallError> {
        match function {
            "parse_pdf" => Ok(self.run_parse_pdf(decode_inputs(self.name(), function, inputs)?)),
            "parse_folder" => {
                Ok(self.run_parse_folder(decode_inputs(self.name(), function, inputs)?))
            }
            other => Err(CallError::UnknownFunction {
                tool: self.name().to_string(),
                function: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tool() -> PdfParserTool {
        PdfParserTool::new(&ChunkingConfig::default())
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let mut t = tool();
        let out = t
            .call("parse_pdf", json!({ "pdf_path": "/no/such/file.pdf" }))
            .unwrap();
        let msg = out["error"].as_str().unwrap();
        assert!(msg.starts_with("Failed to parse PDF:"), "{}", msg);
    }

    #[test]
    fn bad_chunk_size_is_rejected_before_reading() {
        let mut t = tool();
        let out = t
            .call(
                "parse_pdf",
                json!({ "pdf_path": "/no/such/file.pdf", "chunk_size": 0 }),
            )
            .unwrap();
        assert!(out["error"].as_str().unwrap().contains("chunk_size"));
    }

    #[test]
    fn unknown_parser_type_is_rejected() {
        let mut t = tool();
        let out = t
            .call(
                "parse_pdf",
                json!({ "pdf_path": "x.pdf", "parser_type": "ocr" }),
            )
            .unwrap();
        assert!(out["error"].as_str().unwrap().contains("unknown parser type"));
    }

    #[test]
    fn missing_pdf_path_is_invalid_inputs() {
        let mut t = tool();
        let err = t.call("parse_pdf", json!({})).unwrap_err();
        assert!(matches!(err, CallError::InvalidInputs { .. }));
    }

    #[test]
    fn invalid_folder_path() {
        let mut t = tool();
        let out = t
            .call("parse_folder", json!({ "folder_path": "/no/such/dir" }))
            .unwrap();
        assert_eq!(out["error"], "Invalid folder path");
    }

    #[test]
    fn folder_without_pdfs() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "Not a PDF.").unwrap();
        let mut t = tool();
        let out = t
            .call(
                "parse_folder",
                json!({ "folder_path": tmp.path().to_str().unwrap() }),
            )
            .unwrap();
        assert_eq!(out["error"], "No PDF files found in folder");
    }

    #[test]
    fn corrupt_pdfs_are_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.pdf"), b"garbage").unwrap();
        std::fs::write(tmp.path().join("b.pdf"), b"%PDF-1.4 truncated").unwrap();
        let report = parse_folder(tmp.path(), ParserKind::Advanced, 3).unwrap();
        assert!(report.success);
        assert_eq!(report.total_files, 0);
        assert_eq!(report.total_chunks, 0);
        assert!(report.files.is_empty());
        let names: Vec<&str> = report.skipped.iter().map(|s| s.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn nested_pdfs_are_not_scanned() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub").join("deep.pdf"), b"garbage").unwrap();
        assert!(list_pdfs(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn unknown_function() {
        let mut t = tool();
        assert!(matches!(
            t.call("parse_docx", json!({})),
            Err(CallError::UnknownFunction { .. })
        ));
    }
}
