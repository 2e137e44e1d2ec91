use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Page requested before the book's media was successfully analyzed.
    #[error("Media is not ready: {0}")]
    MediaNotReady(String),

    /// Page number outside the 1..=pages range.
    #[error("Page out of bounds: {0}")]
    PageOutOfBounds(String),

    /// Page bytes could not be decoded into the requested image format.
    #[error("Image conversion error: {0}")]
    Conversion(String),

    /// Book file vanished between scan and serve.
    #[error("File not found, it may have moved: {0}")]
    FileNotFound(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Image processing error.
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) | AppError::MediaNotReady(_) | AppError::FileNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::PageOutOfBounds(_) | AppError::Conversion(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(error = %self, "Request error");

        (status, self.to_string()).into_response()
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
