//! Reconciliation of a filesystem snapshot against the persisted catalog.
//!
//! Issues minimal create/update/delete operations: an unmodified series
//! (same ms-truncated directory mtime) is skipped without any write, book
//! identity is reused by url, and a changed file resets the book's media so
//! it gets re-analyzed. Repeated scans of an unchanged tree are no-ops.

use crate::db::{Book, Database, Library, Series};
use crate::error::Result;
use crate::scanner::{self, ScannedBook, ScannedSeries, Snapshot, natural_compare};
use std::collections::HashSet;
use std::path::Path;

/// Reconciliation policy knobs.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Keep a persisted series whose directory is still reported by the
    /// scanner but currently enumerates zero book files. When false the
    /// zero-book invariant is applied eagerly and the series is deleted.
    pub keep_empty_series: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            keep_empty_series: true,
        }
    }
}

/// Counters and follow-up work produced by one library scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Series created this scan.
    pub series_created: usize,
    /// Series whose book set was reconciled.
    pub series_updated: usize,
    /// Series skipped on the unchanged fast path.
    pub series_unchanged: usize,
    /// Series deleted (gone from disk, or emptied with keep_empty_series off).
    pub series_deleted: usize,
    /// Books that need (re-)analysis: newly created or file changed.
    pub books_to_analyze: Vec<i64>,
}

/// The reconciliation core. Safe to call repeatedly; callers must prevent
/// overlapping scans of the same library.
#[derive(Clone)]
pub struct LibraryScanner {
    db: Database,
    options: ScanOptions,
}

impl LibraryScanner {
    /// Create a scanner over the given catalog.
    pub fn new(db: Database, options: ScanOptions) -> Self {
        Self { db, options }
    }

    /// Scan a library's root directory and reconcile the catalog with it.
    pub fn scan_root_folder(&self, library: &Library) -> Result<ScanOutcome> {
        let root = Path::new(&library.root);
        if !root.is_dir() {
            return Err(crate::error::AppError::FileNotFound(library.root.clone()));
        }

        let snapshot = scanner::scan_root(library.id, root)?;
        self.reconcile(library, snapshot)
    }

    /// Diff a snapshot against the persisted catalog and apply the deltas.
    pub fn reconcile(&self, library: &Library, snapshot: Snapshot) -> Result<ScanOutcome> {
        let start = std::time::Instant::now();
        let mut outcome = ScanOutcome::default();

        self.deletion_pass(library, &snapshot, &mut outcome)?;

        for (scanned, scanned_books) in &snapshot {
            if let Err(e) = self.reconcile_series(scanned, scanned_books, &mut outcome) {
                tracing::error!(
                    library = %library.name,
                    series = %scanned.url,
                    error = %e,
                    "Series reconciliation failed, skipping"
                );
            }
        }

        tracing::info!(
            library = %library.name,
            created = outcome.series_created,
            updated = outcome.series_updated,
            unchanged = outcome.series_unchanged,
            deleted = outcome.series_deleted,
            to_analyze = outcome.books_to_analyze.len(),
            elapsed = ?start.elapsed(),
            "Library reconciliation complete"
        );

        Ok(outcome)
    }

    /// Remove persisted series whose url the scanner no longer reports.
    fn deletion_pass(
        &self,
        library: &Library,
        snapshot: &Snapshot,
        outcome: &mut ScanOutcome,
    ) -> Result<()> {
        if snapshot.is_empty() {
            outcome.series_deleted += self.db.delete_series_by_library(library.id)?;
            return Ok(());
        }

        let scanned_urls: HashSet<&str> = snapshot.iter().map(|(s, _)| s.url.as_str()).collect();
        for persisted in self.db.find_series_by_library(library.id)? {
            if !scanned_urls.contains(persisted.url.as_str()) {
                self.db.delete_series(persisted.id)?;
                outcome.series_deleted += 1;
            }
        }
        Ok(())
    }

    fn reconcile_series(
        &self,
        scanned: &ScannedSeries,
        scanned_books: &[ScannedBook],
        outcome: &mut ScanOutcome,
    ) -> Result<()> {
        let existing = self
            .db
            .find_series_by_url(scanned.library_id, &scanned.url)?;

        let Some(mut persisted) = existing else {
            // An empty series is never persisted.
            if scanned_books.is_empty() {
                return Ok(());
            }

            let series = Series {
                id: 0,
                library_id: scanned.library_id,
                name: scanned.name.clone(),
                url: scanned.url.clone(),
                file_last_modified: scanned.file_last_modified,
                created_at: 0,
                updated_at: 0,
            };
            let books = Self::build_books(scanned_books);
            let (series, books) = self.db.create_series_with_books(&series, &books)?;

            tracing::debug!(series = %series.url, books = books.len(), "Created series");
            outcome.series_created += 1;
            outcome.books_to_analyze.extend(books.iter().map(|b| b.id));
            return Ok(());
        };

        if scanned_books.is_empty() {
            if self.options.keep_empty_series {
                outcome.series_unchanged += 1;
            } else {
                self.db.delete_series(persisted.id)?;
                outcome.series_deleted += 1;
            }
            return Ok(());
        }

        // Unmodified fast path: zero writes.
        if persisted.file_last_modified == scanned.file_last_modified {
            outcome.series_unchanged += 1;
            return Ok(());
        }

        persisted.file_last_modified = scanned.file_last_modified;

        let persisted_books = self.db.find_books_by_series(persisted.id)?;
        let mut books = Self::build_books(scanned_books);
        for book in &mut books {
            if let Some(existing) = persisted_books.iter().find(|b| b.url == book.url) {
                book.id = existing.id;
                book.series_id = existing.series_id;
                book.created_at = existing.created_at;
            }
        }

        let delta = self.db.update_books_for_series(&persisted, &books)?;

        tracing::debug!(
            series = %persisted.url,
            inserted = delta.inserted.len(),
            reset = delta.reset.len(),
            deleted = delta.deleted,
            "Updated series"
        );
        outcome.series_updated += 1;
        outcome.books_to_analyze.extend(delta.inserted);
        outcome.books_to_analyze.extend(delta.reset);
        Ok(())
    }

    /// Turn scanned files into book rows: natural sort by filename, with
    /// `number` as the 1-based position in that order.
    fn build_books(scanned: &[ScannedBook]) -> Vec<Book> {
        let mut sorted: Vec<&ScannedBook> = scanned.iter().collect();
        sorted.sort_by(|a, b| natural_compare(&a.name, &b.name));

        sorted
            .into_iter()
            .enumerate()
            .map(|(i, sb)| Book {
                id: 0,
                series_id: 0,
                library_id: sb.library_id,
                name: sb.name.clone(),
                url: sb.url.clone(),
                file_last_modified: sb.file_last_modified,
                file_size: sb.file_size,
                number: (i + 1) as i64,
                created_at: 0,
                updated_at: 0,
            })
            .collect()
    }
}
