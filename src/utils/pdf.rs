//! PDF structural validation and text extraction.
//!
//! Structure and page count come from `lopdf`; text comes from `pdf-extract`.
//! `pdf-extract` panics on some malformed inputs, so extraction runs inside
//! `catch_unwind` and a panic is reported as an extraction failure.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use thiserror::Error;

use crate::models::{PdfQuality, ValidationResult};

/// Magic bytes every PDF starts with
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Files smaller than this are never valid PDFs, whatever their header says
pub const MIN_PDF_SIZE: u64 = 100;

/// Extracted-text length above which a document is graded high quality
const HIGH_QUALITY_TEXT_CHARS: usize = 1000;

/// Errors that can occur during PDF extraction
#[derive(Debug, Error)]
pub enum PdfExtractError {
    #[error("Failed to extract text from PDF: {0}")]
    ExtractionFailed(String),

    #[error("File not found or not a valid PDF: {0}")]
    InvalidFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extract text from an in-memory PDF.
pub fn extract_text_from_bytes(bytes: &[u8]) -> Result<String, PdfExtractError> {
    match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(PdfExtractError::ExtractionFailed(e.to_string())),
        Err(_) => Err(PdfExtractError::ExtractionFailed(
            "text extractor panicked".to_string(),
        )),
    }
}

/// Grade a parsed document.
///
/// Low without text or pages; high with text on at least one page and more
/// than 1000 extracted characters; medium otherwise.
pub fn classify_quality(has_text: bool, page_count: u32, text_chars: usize) -> PdfQuality {
    if !has_text || page_count == 0 {
        PdfQuality::Low
    } else if text_chars > HIGH_QUALITY_TEXT_CHARS {
        PdfQuality::High
    } else {
        PdfQuality::Medium
    }
}

/// Validate an in-memory PDF.
///
/// This is CPU-bound; async callers should go through [`validate_pdf_file`].
pub fn validate_pdf_bytes(bytes: &[u8]) -> ValidationResult {
    let file_size = bytes.len() as u64;

    if file_size < MIN_PDF_SIZE {
        return ValidationResult::invalid(
            file_size,
            format!("File too small to be a PDF ({} bytes)", file_size),
        );
    }

    if !bytes.starts_with(PDF_MAGIC) {
        return ValidationResult::invalid(file_size, "Missing %PDF header");
    }

    let page_count = match catch_unwind(AssertUnwindSafe(|| lopdf::Document::load_mem(bytes))) {
        Ok(Ok(doc)) => doc.get_pages().len() as u32,
        Ok(Err(e)) => {
            return ValidationResult::invalid(
                file_size,
                format!("Failed to parse PDF structure: {}", e),
            )
        }
        Err(_) => {
            return ValidationResult::invalid(file_size, "PDF parser panicked");
        }
    };

    let text = match extract_text_from_bytes(bytes) {
        Ok(text) => text,
        Err(e) => {
            // Scanned or image-only documents land here; they are still PDFs.
            tracing::debug!("No extractable text: {}", e);
            String::new()
        }
    };

    let text_chars = text.trim().chars().count();
    let has_text = text_chars > 0;

    ValidationResult {
        is_valid: true,
        file_size,
        page_count: Some(page_count),
        has_text,
        quality: classify_quality(has_text, page_count, text_chars),
        errors: Vec::new(),
    }
}

/// Validate a PDF on disk, parsing on a blocking thread.
pub async fn validate_pdf_file(path: &Path) -> Result<ValidationResult, PdfExtractError> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(PdfExtractError::InvalidFile(format!(
            "Not a file: {}",
            path.display()
        )));
    }

    if metadata.len() < MIN_PDF_SIZE {
        return Ok(ValidationResult::invalid(
            metadata.len(),
            format!("File too small to be a PDF ({} bytes)", metadata.len()),
        ));
    }

    let bytes = tokio::fs::read(path).await?;
    let file_size = bytes.len() as u64;

    match tokio::task::spawn_blocking(move || validate_pdf_bytes(&bytes)).await {
        Ok(result) => Ok(result),
        Err(e) => Ok(ValidationResult::invalid(
            file_size,
            format!("Validation task failed: {}", e),
        )),
    }
}
