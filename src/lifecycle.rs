//! Book lifecycle: analysis persistence, thumbnail regeneration, metadata
//! refresh and on-demand page retrieval.

use crate::db::{Book, Database, Media, MediaStatus};
use crate::error::{AppError, Result};
use crate::media::{self, archive, comicinfo, image};
use std::path::Path;

/// Bytes of one served page plus the resulting media type.
#[derive(Debug)]
pub struct PageContent {
    /// Page bytes, possibly converted/resized.
    pub bytes: Vec<u8>,
    /// Media type of `bytes`.
    pub media_type: String,
}

/// Orchestrates analysis results and page serving over the catalog.
#[derive(Clone)]
pub struct BookLifecycle {
    db: Database,
    thumbnail_size: u32,
}

impl BookLifecycle {
    /// Create a lifecycle over the given catalog.
    pub fn new(db: Database, thumbnail_size: u32) -> Self {
        Self { db, thumbnail_size }
    }

    /// Load a book or fail with NotFound.
    pub fn book(&self, book_id: i64) -> Result<Book> {
        self.db
            .get_book(book_id)?
            .ok_or_else(|| AppError::NotFound(format!("Book {}", book_id)))
    }

    /// Load a book's media or fail with NotFound.
    pub fn media(&self, book_id: i64) -> Result<Media> {
        self.db
            .get_media(book_id)?
            .ok_or_else(|| AppError::NotFound(format!("Media for book {}", book_id)))
    }

    /// Run analysis on a book's archive and persist the result, preserving
    /// the media row's created_at. Analysis itself never fails; a corrupt or
    /// unsupported archive is recorded in the media status.
    pub fn analyze_and_persist(&self, book_id: i64) -> Result<MediaStatus> {
        let book = self.book(book_id)?;
        let analyzed = media::analyze(book_id, Path::new(&book.url), self.thumbnail_size);
        self.db.save_media(&analyzed)?;

        tracing::info!(
            book = %book.name,
            status = analyzed.status.as_str(),
            pages = analyzed.page_count(),
            "Book analyzed"
        );
        Ok(analyzed.status)
    }

    /// Re-derive only the thumbnail from the first page, leaving the rest of
    /// the analysis untouched.
    pub fn regenerate_thumbnail_and_persist(&self, book_id: i64) -> Result<()> {
        let book = self.book(book_id)?;
        let media = self.media(book_id)?;

        if media.status != MediaStatus::Ready {
            return Err(AppError::MediaNotReady(book.name));
        }
        let first = media
            .pages
            .first()
            .ok_or_else(|| AppError::MediaNotReady(book.name.clone()))?;

        let thumb = media::generate_thumbnail(Path::new(&book.url), &first.file_name, self.thumbnail_size)
            .ok_or_else(|| {
                AppError::Conversion(format!("Failed to generate thumbnail for {}", book.name))
            })?;

        self.db.save_thumbnail(book_id, &thumb)?;
        tracing::info!(book = %book.name, "Thumbnail regenerated");
        Ok(())
    }

    /// Harvest a ComicInfo.xml sidecar, if analysis found one, into the
    /// book's name and the media comment. A no-op for books without one.
    pub fn refresh_metadata(&self, book_id: i64) -> Result<()> {
        let book = self.book(book_id)?;
        let media = self.media(book_id)?;

        if media.status != MediaStatus::Ready {
            tracing::debug!(book = %book.name, "Skipping metadata refresh, media not ready");
            return Ok(());
        }

        let Some(entry) = comicinfo::find_sidecar(&media.files) else {
            return Ok(());
        };

        let data = archive::read_entry(Path::new(&book.url), entry)?;
        let xml = String::from_utf8_lossy(&data);
        let info = comicinfo::parse(&xml)?;

        if info.title.is_some() || info.summary.is_some() {
            self.db
                .update_book_metadata(book_id, info.title.as_deref(), info.summary.as_deref())?;
        }

        tracing::info!(book = %book.name, "Metadata refreshed from ComicInfo.xml");
        Ok(())
    }

    /// Stored first-page thumbnail, or NotFound when analysis produced none.
    pub fn get_thumbnail(&self, book_id: i64) -> Result<(Vec<u8>, i64)> {
        let media = self.media(book_id)?;
        let thumb = media
            .thumbnail
            .ok_or_else(|| AppError::NotFound(format!("No thumbnail for book {}", book_id)))?;
        Ok((thumb, media.updated_at))
    }

    /// Retrieve one page of a book. `page_number` is 1-based. Fails with
    /// MediaNotReady before successful analysis, PageOutOfBounds outside
    /// 1..=pages, Conversion when the bytes cannot be decoded for a
    /// requested conversion/resize, and FileNotFound when the archive
    /// vanished since the last scan.
    pub fn get_book_page(
        &self,
        book_id: i64,
        page_number: i64,
        convert_to: Option<image::OutputFormat>,
        resize_to: Option<u32>,
    ) -> Result<PageContent> {
        let book = self.book(book_id)?;
        let media = self.media(book_id)?;

        if media.status != MediaStatus::Ready {
            return Err(AppError::MediaNotReady(book.name));
        }
        if page_number < 1 || page_number > media.pages.len() as i64 {
            return Err(AppError::PageOutOfBounds(format!(
                "Page {} of {} for {}",
                page_number,
                media.pages.len(),
                book.name
            )));
        }

        let page = &media.pages[(page_number - 1) as usize];
        let data = archive::read_entry(Path::new(&book.url), &page.file_name)?;
        let (bytes, media_type) = image::convert_page(data, &page.media_type, convert_to, resize_to)?;

        Ok(PageContent { bytes, media_type })
    }
}
