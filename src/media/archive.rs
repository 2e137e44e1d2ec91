//! ZIP archive access: entry classification and page extraction.

use crate::db::BookPage;
use crate::error::{AppError, Result};
use crate::scanner::natural_compare;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// Classified archive listing.
#[derive(Debug, Default)]
pub struct ArchiveContents {
    /// Image entries in natural order.
    pub pages: Vec<BookPage>,
    /// Non-image entries (metadata sidecars and the like).
    pub files: Vec<String>,
}

/// Media type for a page image entry, by extension.
pub fn image_media_type(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        Some("image/jpeg")
    } else if lower.ends_with(".png") {
        Some("image/png")
    } else if lower.ends_with(".gif") {
        Some("image/gif")
    } else if lower.ends_with(".webp") {
        Some("image/webp")
    } else if lower.ends_with(".jxl") {
        Some("image/jxl")
    } else {
        None
    }
}

fn is_ignored(name: &str) -> bool {
    // macOS resource forks and hidden entries
    name.contains("__MACOSX")
        || Path::new(name)
            .file_name()
            .and_then(|s| s.to_str())
            .is_none_or(|s| s.starts_with('.'))
}

/// List and classify the entries of a ZIP archive. Image entries become
/// pages sorted in natural order; everything else lands in `files`.
pub fn list_entries(path: &Path) -> Result<ArchiveContents> {
    let file = File::open(path)?;
    let archive = ZipArchive::new(file)?;

    let mut contents = ArchiveContents::default();

    for name in archive.file_names() {
        if name.ends_with('/') || is_ignored(name) {
            continue;
        }

        match image_media_type(name) {
            Some(media_type) => contents.pages.push(BookPage {
                file_name: name.to_string(),
                media_type: media_type.to_string(),
            }),
            None => contents.files.push(name.to_string()),
        }
    }

    contents
        .pages
        .sort_by(|a, b| natural_compare(&a.file_name, &b.file_name));
    contents.files.sort();

    Ok(contents)
}

/// Read one entry's bytes out of the archive.
pub fn read_entry(path: &Path, entry_name: &str) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::FileNotFound(path.display().to_string())
        } else {
            AppError::Io(e)
        }
    })?;
    let mut archive = ZipArchive::new(file)?;

    let mut data = Vec::new();
    archive.by_name(entry_name)?.read_to_end(&mut data)?;
    Ok(data)
}
