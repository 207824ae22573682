//! Report generation error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("PDF encoding error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid report input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;
