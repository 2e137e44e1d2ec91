//! Media analysis: opens a book archive and extracts container type,
//! ordered pages, auxiliary files and a first-page thumbnail.

pub mod archive;
pub mod comicinfo;
pub mod image;

use crate::db::{Media, MediaStatus};
use std::path::Path;

/// What the container extension tells us about a file.
enum Container {
    /// ZIP-based archive we can decode.
    Zip(&'static str),
    /// Recognized comic container we cannot decode.
    Undecodable(&'static str),
}

fn container_for(path: &Path) -> Option<Container> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "cbz" => Some(Container::Zip("application/vnd.comicbook+zip")),
        "zip" => Some(Container::Zip("application/zip")),
        "cbr" | "rar" => Some(Container::Undecodable("application/vnd.comicbook-rar")),
        "cb7" => Some(Container::Undecodable("application/x-cb7")),
        _ => None,
    }
}

/// Analyze one book archive. Never fails: unreadable archives come back as
/// status Error, unrecognized containers as Unsupported. No file handle is
/// kept open past return.
pub fn analyze(book_id: i64, path: &Path, thumbnail_size: u32) -> Media {
    let mut media = Media::unknown(book_id);

    let container = match container_for(path) {
        Some(c) => c,
        None => {
            tracing::info!(path = %path.display(), "Unrecognized container format");
            media.status = MediaStatus::Unsupported;
            return media;
        }
    };

    let mime = match container {
        Container::Zip(mime) => mime,
        Container::Undecodable(mime) => {
            tracing::info!(path = %path.display(), media_type = mime, "Container not decodable");
            media.status = MediaStatus::Unsupported;
            media.media_type = Some(mime.to_string());
            return media;
        }
    };

    media.media_type = Some(mime.to_string());

    let contents = match archive::list_entries(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read archive");
            media.status = MediaStatus::Error;
            return media;
        }
    };

    if contents.pages.is_empty() {
        tracing::warn!(path = %path.display(), "Archive contains no pages");
        media.status = MediaStatus::Error;
        media.files = contents.files;
        return media;
    }

    media.thumbnail = generate_thumbnail(path, &contents.pages[0].file_name, thumbnail_size);
    media.pages = contents.pages;
    media.files = contents.files;
    media.status = MediaStatus::Ready;
    media
}

/// Extract and downscale the given page as a PNG thumbnail. A page that
/// fails to decode just leaves the book without a thumbnail.
pub fn generate_thumbnail(path: &Path, page_name: &str, size: u32) -> Option<Vec<u8>> {
    let data = match archive::read_entry(path, page_name) {
        Ok(d) => d,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Failed to read thumbnail page");
            return None;
        }
    };

    match image::thumbnail(&data, size) {
        Ok(thumb) => Some(thumb),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Failed to generate thumbnail");
            None
        }
    }
}
