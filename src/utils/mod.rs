//! Utility modules supporting discovery and retrieval.
//!
//! - [`HttpClient`]: shared HTTP client for catalog lookups
//! - [`validate_pdf_bytes`] / [`validate_pdf_file`]: structural PDF validation
//! - [`extract_text_from_bytes`]: text extraction used to grade quality

mod http;
mod pdf;

pub use http::{HttpClient, DEFAULT_USER_AGENT};
pub use pdf::{
    classify_quality, extract_text_from_bytes, validate_pdf_bytes, validate_pdf_file,
    PdfExtractError, MIN_PDF_SIZE, PDF_MAGIC,
};
