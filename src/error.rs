use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },
    #[error("unreadable document {}: {reason}", path.display())]
    UnreadableDocument { path: PathBuf, reason: String },
    #[error("invalid mask: {0}")]
    InvalidMask(String),
    #[error("no usable font found, pass one explicitly with --font")]
    NoFontAvailable,
    #[error("invalid font: {reason}")]
    InvalidFont { reason: String },
    #[error("invalid color {value:?}: {reason}")]
    InvalidColor { value: String, reason: String },
    #[error("render error: {0}")]
    Render(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
