use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::Path;
use std::sync::Arc;

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// Outcome of replacing a series' book set.
#[derive(Debug, Default)]
pub struct BookSetDelta {
    /// IDs of freshly inserted books (media initialized to Unknown).
    pub inserted: Vec<i64>,
    /// IDs of reused books whose file changed and whose media was reset.
    pub reset: Vec<i64>,
    /// Number of books deleted because they left the new list.
    pub deleted: usize,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Libraries table
            CREATE TABLE IF NOT EXISTS libraries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                root TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Series table
            CREATE TABLE IF NOT EXISTS series (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                library_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                file_last_modified INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (library_id, url),
                FOREIGN KEY (library_id) REFERENCES libraries(id) ON DELETE CASCADE
            );

            -- Books table
            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                series_id INTEGER NOT NULL,
                library_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                file_last_modified INTEGER NOT NULL,
                file_size INTEGER NOT NULL,
                number INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (series_id) REFERENCES series(id) ON DELETE CASCADE,
                FOREIGN KEY (library_id) REFERENCES libraries(id) ON DELETE CASCADE
            );

            -- Media table (one row per book)
            CREATE TABLE IF NOT EXISTS media (
                book_id INTEGER PRIMARY KEY,
                status TEXT NOT NULL DEFAULT 'UNKNOWN',
                media_type TEXT,
                comment TEXT,
                thumbnail BLOB,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Ordered page list per media
            CREATE TABLE IF NOT EXISTS media_pages (
                book_id INTEGER NOT NULL,
                idx INTEGER NOT NULL,
                file_name TEXT NOT NULL,
                media_type TEXT NOT NULL,
                PRIMARY KEY (book_id, idx),
                FOREIGN KEY (book_id) REFERENCES media(book_id) ON DELETE CASCADE
            );

            -- Auxiliary (non-image) archive entries per media
            CREATE TABLE IF NOT EXISTS media_files (
                book_id INTEGER NOT NULL,
                file_name TEXT NOT NULL,
                FOREIGN KEY (book_id) REFERENCES media(book_id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_series_library ON series(library_id);
            CREATE INDEX IF NOT EXISTS idx_books_series ON books(series_id);
            CREATE INDEX IF NOT EXISTS idx_books_library_url ON books(library_id, url);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== LIBRARY OPERATIONS ==========

    /// Create a new library.
    pub fn create_library(&self, name: &str, root: &str) -> Result<Library> {
        let conn = self.conn.lock();
        let now = now_millis();
        conn.execute(
            "INSERT INTO libraries (name, root, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, root, now, now],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::Config(format!("Library '{}' already exists", name))
            } else {
                AppError::Internal(format!("Failed to create library: {}", e))
            }
        })?;

        Ok(Library {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            root: root.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Get library by ID.
    pub fn get_library(&self, id: i64) -> Result<Option<Library>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, root, created_at, updated_at FROM libraries WHERE id = ?1",
            params![id],
            Self::row_to_library,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get library: {}", e)))
    }

    /// Get library by name.
    pub fn get_library_by_name(&self, name: &str) -> Result<Option<Library>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, root, created_at, updated_at FROM libraries WHERE name = ?1",
            params![name],
            Self::row_to_library,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get library: {}", e)))
    }

    /// List all libraries.
    pub fn list_libraries(&self) -> Result<Vec<Library>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, name, root, created_at, updated_at FROM libraries ORDER BY name")
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let libraries = stmt
            .query_map([], Self::row_to_library)
            .map_err(|e| AppError::Internal(format!("Failed to list libraries: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect libraries: {}", e)))?;

        Ok(libraries)
    }

    /// Delete a library and its whole catalog subtree.
    pub fn delete_library(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = Self::begin(&mut conn)?;

        Self::delete_media_rows_for_library(&tx, id)?;
        Self::exec(
            &tx,
            "DELETE FROM books WHERE library_id = ?1",
            params![id],
            "delete books",
        )?;
        Self::exec(
            &tx,
            "DELETE FROM series WHERE library_id = ?1",
            params![id],
            "delete series",
        )?;
        let rows = Self::exec(
            &tx,
            "DELETE FROM libraries WHERE id = ?1",
            params![id],
            "delete library",
        )?;

        Self::commit(tx)?;
        Ok(rows > 0)
    }

    fn row_to_library(row: &rusqlite::Row<'_>) -> rusqlite::Result<Library> {
        Ok(Library {
            id: row.get(0)?,
            name: row.get(1)?,
            root: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    // ========== SERIES FINDERS ==========

    /// Get series by ID.
    pub fn get_series(&self, id: i64) -> Result<Option<Series>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, library_id, name, url, file_last_modified, created_at, updated_at
             FROM series WHERE id = ?1",
            params![id],
            Self::row_to_series,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get series: {}", e)))
    }

    /// Find a series by its natural key within a library.
    pub fn find_series_by_url(&self, library_id: i64, url: &str) -> Result<Option<Series>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, library_id, name, url, file_last_modified, created_at, updated_at
             FROM series WHERE library_id = ?1 AND url = ?2",
            params![library_id, url],
            Self::row_to_series,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to find series: {}", e)))
    }

    /// List all series belonging to a library.
    pub fn find_series_by_library(&self, library_id: i64) -> Result<Vec<Series>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, library_id, name, url, file_last_modified, created_at, updated_at
                 FROM series WHERE library_id = ?1 ORDER BY name",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let series = stmt
            .query_map(params![library_id], Self::row_to_series)
            .map_err(|e| AppError::Internal(format!("Failed to list series: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect series: {}", e)))?;

        Ok(series)
    }

    /// Count series in a library.
    pub fn count_series(&self, library_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM series WHERE library_id = ?1",
            params![library_id],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Internal(format!("Failed to count series: {}", e)))
    }

    fn row_to_series(row: &rusqlite::Row<'_>) -> rusqlite::Result<Series> {
        Ok(Series {
            id: row.get(0)?,
            library_id: row.get(1)?,
            name: row.get(2)?,
            url: row.get(3)?,
            file_last_modified: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    // ========== BOOK FINDERS ==========

    /// Get book by ID.
    pub fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, series_id, library_id, name, url, file_last_modified, file_size,
                    number, created_at, updated_at
             FROM books WHERE id = ?1",
            params![id],
            Self::row_to_book,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get book: {}", e)))
    }

    /// List books in a series, in natural order.
    pub fn find_books_by_series(&self, series_id: i64) -> Result<Vec<Book>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, series_id, library_id, name, url, file_last_modified, file_size,
                        number, created_at, updated_at
                 FROM books WHERE series_id = ?1 ORDER BY number",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map(params![series_id], Self::row_to_book)
            .map_err(|e| AppError::Internal(format!("Failed to list books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    /// Count books in a library.
    pub fn count_books(&self, library_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM books WHERE library_id = ?1",
            params![library_id],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Internal(format!("Failed to count books: {}", e)))
    }

    /// Apply harvested metadata to a book's name and its media comment in
    /// one transaction, so a partial refresh is never observable.
    pub fn update_book_metadata(
        &self,
        book_id: i64,
        name: Option<&str>,
        comment: Option<&str>,
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = Self::begin(&mut conn)?;
        let now = now_millis();

        if let Some(name) = name {
            Self::exec(
                &tx,
                "UPDATE books SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![name, now, book_id],
                "update book name",
            )?;
        }
        if let Some(comment) = comment {
            Self::exec(
                &tx,
                "UPDATE media SET comment = ?1, updated_at = ?2 WHERE book_id = ?3",
                params![comment, now, book_id],
                "update media comment",
            )?;
        }

        Self::commit(tx)
    }

    fn row_to_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
        Ok(Book {
            id: row.get(0)?,
            series_id: row.get(1)?,
            library_id: row.get(2)?,
            name: row.get(3)?,
            url: row.get(4)?,
            file_last_modified: row.get(5)?,
            file_size: row.get(6)?,
            number: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    // ========== MEDIA OPERATIONS ==========

    /// Get the media row for a book, with pages and auxiliary files.
    pub fn get_media(&self, book_id: i64) -> Result<Option<Media>> {
        let conn = self.conn.lock();
        let media = conn
            .query_row(
                "SELECT book_id, status, media_type, comment, thumbnail, created_at, updated_at
                 FROM media WHERE book_id = ?1",
                params![book_id],
                |row| {
                    let status: String = row.get(1)?;
                    Ok(Media {
                        book_id: row.get(0)?,
                        status: MediaStatus::from_str(&status),
                        media_type: row.get(2)?,
                        comment: row.get(3)?,
                        thumbnail: row.get(4)?,
                        pages: Vec::new(),
                        files: Vec::new(),
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get media: {}", e)))?;

        let Some(mut media) = media else {
            return Ok(None);
        };

        let mut stmt = conn
            .prepare(
                "SELECT file_name, media_type FROM media_pages WHERE book_id = ?1 ORDER BY idx",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;
        media.pages = stmt
            .query_map(params![book_id], |row| {
                Ok(BookPage {
                    file_name: row.get(0)?,
                    media_type: row.get(1)?,
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to get pages: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect pages: {}", e)))?;

        let mut stmt = conn
            .prepare("SELECT file_name FROM media_files WHERE book_id = ?1 ORDER BY file_name")
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;
        media.files = stmt
            .query_map(params![book_id], |row| row.get(0))
            .map_err(|e| AppError::Internal(format!("Failed to get media files: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect media files: {}", e)))?;

        Ok(Some(media))
    }

    /// Persist an analysis result, preserving the media row's created_at.
    pub fn save_media(&self, media: &Media) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = Self::begin(&mut conn)?;
        let now = now_millis();

        Self::exec(
            &tx,
            "UPDATE media SET status = ?1, media_type = ?2, comment = ?3, thumbnail = ?4,
                    updated_at = ?5
             WHERE book_id = ?6",
            params![
                media.status.as_str(),
                media.media_type,
                media.comment,
                media.thumbnail,
                now,
                media.book_id,
            ],
            "update media",
        )?;

        Self::replace_media_children(&tx, media.book_id, &media.pages, &media.files)?;

        Self::commit(tx)
    }

    /// Update only a media's thumbnail, leaving analysis results alone.
    pub fn save_thumbnail(&self, book_id: i64, thumbnail: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE media SET thumbnail = ?1, updated_at = ?2 WHERE book_id = ?3",
            params![thumbnail, now_millis(), book_id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to save thumbnail: {}", e)))?;
        Ok(())
    }

    // ========== SERIES LIFECYCLE ==========

    /// Persist a new series and all its books atomically. Every book gets a
    /// freshly initialized Unknown media row. Returns the persisted rows
    /// with their assigned IDs.
    pub fn create_series_with_books(
        &self,
        series: &Series,
        books: &[Book],
    ) -> Result<(Series, Vec<Book>)> {
        let mut conn = self.conn.lock();
        let tx = Self::begin(&mut conn)?;
        let now = now_millis();

        Self::exec(
            &tx,
            "INSERT INTO series (library_id, name, url, file_last_modified, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                series.library_id,
                series.name,
                series.url,
                series.file_last_modified,
                now,
                now,
            ],
            "insert series",
        )?;
        let series_id = tx.last_insert_rowid();

        let mut persisted_books = Vec::with_capacity(books.len());
        for book in books {
            let book_id = Self::insert_book(&tx, series_id, book, now)?;
            let mut persisted = book.clone();
            persisted.id = book_id;
            persisted.series_id = series_id;
            persisted.created_at = now;
            persisted.updated_at = now;
            persisted_books.push(persisted);
        }

        Self::commit(tx)?;

        let mut persisted_series = series.clone();
        persisted_series.id = series_id;
        persisted_series.created_at = now;
        persisted_series.updated_at = now;
        Ok((persisted_series, persisted_books))
    }

    /// Delete a series with its books and media. Idempotent no-op when the
    /// series is already gone.
    pub fn delete_series(&self, series_id: i64) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = Self::begin(&mut conn)?;
        Self::delete_series_tx(&tx, series_id)?;
        Self::commit(tx)
    }

    /// Delete every series of a library. Returns the number of series removed.
    pub fn delete_series_by_library(&self, library_id: i64) -> Result<usize> {
        let ids: Vec<i64> = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare("SELECT id FROM series WHERE library_id = ?1")
                .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;
            stmt.query_map(params![library_id], |row| row.get(0))
                .map_err(|e| AppError::Internal(format!("Failed to list series: {}", e)))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AppError::Internal(format!("Failed to collect series: {}", e)))?
        };

        for id in &ids {
            self.delete_series(*id)?;
        }
        Ok(ids.len())
    }

    /// Replace a series' book set with a reconciled list in one transaction.
    ///
    /// Books matched by ID keep their row and created_at; matched books whose
    /// file_last_modified differs from the persisted value also get their
    /// media reset to Unknown. Persisted books absent from the new list are
    /// deleted, books without an ID are inserted with Unknown media. The
    /// series row's file_last_modified is updated in the same transaction.
    pub fn update_books_for_series(&self, series: &Series, books: &[Book]) -> Result<BookSetDelta> {
        let mut conn = self.conn.lock();
        let tx = Self::begin(&mut conn)?;
        let now = now_millis();
        let mut delta = BookSetDelta::default();

        Self::exec(
            &tx,
            "UPDATE series SET file_last_modified = ?1, updated_at = ?2 WHERE id = ?3",
            params![series.file_last_modified, now, series.id],
            "update series",
        )?;

        // Persisted state, keyed by book id.
        let persisted: Vec<(i64, i64, i64, i64, String)> = {
            let mut stmt = tx
                .prepare(
                    "SELECT id, file_last_modified, file_size, number, name
                     FROM books WHERE series_id = ?1",
                )
                .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;
            stmt.query_map(params![series.id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })
            .map_err(|e| AppError::Internal(format!("Failed to load books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?
        };

        let kept_ids: std::collections::HashSet<i64> =
            books.iter().filter(|b| b.id != 0).map(|b| b.id).collect();

        for (id, _, _, _, _) in persisted.iter().filter(|(id, ..)| !kept_ids.contains(id)) {
            Self::delete_book_tx(&tx, *id)?;
            delta.deleted += 1;
        }

        for book in books {
            if book.id == 0 {
                let book_id = Self::insert_book(&tx, series.id, book, now)?;
                delta.inserted.push(book_id);
                continue;
            }

            let Some((_, old_mtime, old_size, old_number, old_name)) =
                persisted.iter().find(|(id, ..)| *id == book.id)
            else {
                return Err(AppError::Internal(format!(
                    "Book {} is not part of series {}",
                    book.id, series.id
                )));
            };

            let file_changed = *old_mtime != book.file_last_modified;
            let row_changed = file_changed
                || *old_size != book.file_size
                || *old_number != book.number
                || *old_name != book.name;

            if row_changed {
                Self::exec(
                    &tx,
                    "UPDATE books SET name = ?1, url = ?2, file_last_modified = ?3,
                            file_size = ?4, number = ?5, updated_at = ?6
                     WHERE id = ?7",
                    params![
                        book.name,
                        book.url,
                        book.file_last_modified,
                        book.file_size,
                        book.number,
                        now,
                        book.id,
                    ],
                    "update book",
                )?;
            }

            if file_changed {
                Self::reset_media_tx(&tx, book.id, now)?;
                delta.reset.push(book.id);
            }
        }

        Self::commit(tx)?;
        Ok(delta)
    }

    // ========== TRANSACTION HELPERS ==========

    fn begin<'a>(conn: &'a mut Connection) -> Result<Transaction<'a>> {
        conn.transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))
    }

    fn commit(tx: Transaction<'_>) -> Result<()> {
        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))
    }

    fn exec(
        tx: &Transaction<'_>,
        sql: &str,
        params: impl rusqlite::Params,
        what: &str,
    ) -> Result<usize> {
        tx.execute(sql, params)
            .map_err(|e| AppError::Internal(format!("Failed to {}: {}", what, e)))
    }

    fn insert_book(tx: &Transaction<'_>, series_id: i64, book: &Book, now: i64) -> Result<i64> {
        Self::exec(
            tx,
            "INSERT INTO books (series_id, library_id, name, url, file_last_modified,
                                file_size, number, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                series_id,
                book.library_id,
                book.name,
                book.url,
                book.file_last_modified,
                book.file_size,
                book.number,
                now,
                now,
            ],
            "insert book",
        )?;
        let book_id = tx.last_insert_rowid();

        Self::exec(
            tx,
            "INSERT INTO media (book_id, status, created_at, updated_at)
             VALUES (?1, 'UNKNOWN', ?2, ?3)",
            params![book_id, now, now],
            "insert media",
        )?;

        Ok(book_id)
    }

    fn delete_book_tx(tx: &Transaction<'_>, book_id: i64) -> Result<()> {
        Self::exec(
            tx,
            "DELETE FROM media_pages WHERE book_id = ?1",
            params![book_id],
            "delete pages",
        )?;
        Self::exec(
            tx,
            "DELETE FROM media_files WHERE book_id = ?1",
            params![book_id],
            "delete media files",
        )?;
        Self::exec(
            tx,
            "DELETE FROM media WHERE book_id = ?1",
            params![book_id],
            "delete media",
        )?;
        Self::exec(
            tx,
            "DELETE FROM books WHERE id = ?1",
            params![book_id],
            "delete book",
        )?;
        Ok(())
    }

    fn delete_series_tx(tx: &Transaction<'_>, series_id: i64) -> Result<()> {
        let book_ids: Vec<i64> = {
            let mut stmt = tx
                .prepare("SELECT id FROM books WHERE series_id = ?1")
                .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;
            stmt.query_map(params![series_id], |row| row.get(0))
                .map_err(|e| AppError::Internal(format!("Failed to list books: {}", e)))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?
        };

        for book_id in book_ids {
            Self::delete_book_tx(tx, book_id)?;
        }

        Self::exec(
            tx,
            "DELETE FROM series WHERE id = ?1",
            params![series_id],
            "delete series",
        )?;
        Ok(())
    }

    fn reset_media_tx(tx: &Transaction<'_>, book_id: i64, now: i64) -> Result<()> {
        Self::exec(
            tx,
            "UPDATE media SET status = 'UNKNOWN', media_type = NULL, comment = NULL,
                    thumbnail = NULL, updated_at = ?1
             WHERE book_id = ?2",
            params![now, book_id],
            "reset media",
        )?;
        Self::exec(
            tx,
            "DELETE FROM media_pages WHERE book_id = ?1",
            params![book_id],
            "delete pages",
        )?;
        Self::exec(
            tx,
            "DELETE FROM media_files WHERE book_id = ?1",
            params![book_id],
            "delete media files",
        )?;
        Ok(())
    }

    fn replace_media_children(
        tx: &Transaction<'_>,
        book_id: i64,
        pages: &[BookPage],
        files: &[String],
    ) -> Result<()> {
        Self::exec(
            tx,
            "DELETE FROM media_pages WHERE book_id = ?1",
            params![book_id],
            "delete pages",
        )?;
        Self::exec(
            tx,
            "DELETE FROM media_files WHERE book_id = ?1",
            params![book_id],
            "delete media files",
        )?;

        for (idx, page) in pages.iter().enumerate() {
            Self::exec(
                tx,
                "INSERT INTO media_pages (book_id, idx, file_name, media_type)
                 VALUES (?1, ?2, ?3, ?4)",
                params![book_id, idx as i64, page.file_name, page.media_type],
                "insert page",
            )?;
        }
        for file_name in files {
            Self::exec(
                tx,
                "INSERT INTO media_files (book_id, file_name) VALUES (?1, ?2)",
                params![book_id, file_name],
                "insert media file",
            )?;
        }
        Ok(())
    }

    fn delete_media_rows_for_library(tx: &Transaction<'_>, library_id: i64) -> Result<()> {
        Self::exec(
            tx,
            "DELETE FROM media_pages WHERE book_id IN (SELECT id FROM books WHERE library_id = ?1)",
            params![library_id],
            "delete pages",
        )?;
        Self::exec(
            tx,
            "DELETE FROM media_files WHERE book_id IN (SELECT id FROM books WHERE library_id = ?1)",
            params![library_id],
            "delete media files",
        )?;
        Self::exec(
            tx,
            "DELETE FROM media WHERE book_id IN (SELECT id FROM books WHERE library_id = ?1)",
            params![library_id],
            "delete media",
        )?;
        Ok(())
    }
}
