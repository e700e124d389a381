use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to load PDF: {0}")]
    PdfLoad(#[from] lopdf::Error),

    #[error("failed to read content of page {page}: {message}")]
    Content { page: u32, message: String },

    #[error("invalid raw content tree: {0}")]
    RawContent(#[from] serde_json::Error),

    #[error("invalid option: {0}")]
    InvalidOption(String),
}
