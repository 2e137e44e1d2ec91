mod schema;

pub use schema::{BookSetDelta, Database};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A configured root directory tracked by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    /// Database-assigned library ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Root directory path.
    pub root: String,
    /// Creation timestamp (ms).
    pub created_at: i64,
    /// Last update timestamp (ms).
    pub updated_at: i64,
}

/// One directory of book archives inside a library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    /// Database-assigned series ID (0 until first persisted).
    pub id: i64,
    /// Owning library ID.
    pub library_id: i64,
    /// Display name (directory name).
    pub name: String,
    /// Canonical filesystem path of the series directory.
    pub url: String,
    /// Directory mtime at last scan, truncated to milliseconds.
    pub file_last_modified: i64,
    /// Creation timestamp (ms), immutable after first persistence.
    pub created_at: i64,
    /// Last update timestamp (ms).
    pub updated_at: i64,
}

/// One archive file belonging to a series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Database-assigned book ID (0 until first persisted).
    pub id: i64,
    /// Owning series ID.
    pub series_id: i64,
    /// Owning library ID.
    pub library_id: i64,
    /// Display name (file stem).
    pub name: String,
    /// Canonical filesystem path of the archive file.
    pub url: String,
    /// File mtime, truncated to milliseconds.
    pub file_last_modified: i64,
    /// File size in bytes.
    pub file_size: i64,
    /// Position under natural sort of filenames within the series.
    pub number: i64,
    /// Creation timestamp (ms), immutable after first persistence.
    pub created_at: i64,
    /// Last update timestamp (ms).
    pub updated_at: i64,
}

/// Analysis state of a book's media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    /// Not yet analyzed (initial state, also the post-reset state).
    Unknown,
    /// Analysis succeeded, pages are authoritative.
    Ready,
    /// Archive was unreadable or corrupt.
    Error,
    /// Container format is not decodable.
    Unsupported,
}

impl MediaStatus {
    /// Stable storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Unknown => "UNKNOWN",
            MediaStatus::Ready => "READY",
            MediaStatus::Error => "ERROR",
            MediaStatus::Unsupported => "UNSUPPORTED",
        }
    }

    /// Parse the storage representation, defaulting to Unknown.
    pub fn from_str(s: &str) -> Self {
        match s {
            "READY" => MediaStatus::Ready,
            "ERROR" => MediaStatus::Error,
            "UNSUPPORTED" => MediaStatus::Unsupported,
            _ => MediaStatus::Unknown,
        }
    }
}

/// One page image inside a book archive. Ordering is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookPage {
    /// Entry name inside the archive.
    pub file_name: String,
    /// Sniffed media type of the page image.
    pub media_type: String,
}

/// Analysis result attached to a book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    /// Owning book ID.
    pub book_id: i64,
    /// Analysis state.
    pub status: MediaStatus,
    /// Container MIME type, known once analyzed.
    pub media_type: Option<String>,
    /// Embedded comment or summary harvested from metadata.
    pub comment: Option<String>,
    /// Ordered page list, authoritative only when status is Ready.
    pub pages: Vec<BookPage>,
    /// Auxiliary (non-image) entry names found inside the archive.
    pub files: Vec<String>,
    /// First-page thumbnail (PNG bytes).
    #[serde(skip_serializing)]
    pub thumbnail: Option<Vec<u8>>,
    /// Creation timestamp (ms), immutable after first persistence.
    pub created_at: i64,
    /// Last update timestamp (ms).
    pub updated_at: i64,
}

impl Media {
    /// Empty, unanalyzed media for a freshly created book.
    pub fn unknown(book_id: i64) -> Self {
        let now = now_millis();
        Self {
            book_id,
            status: MediaStatus::Unknown,
            media_type: None,
            comment: None,
            pages: Vec::new(),
            files: Vec::new(),
            thumbnail: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Current timestamp in milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
