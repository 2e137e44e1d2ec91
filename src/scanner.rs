//! Filesystem scanning: pure snapshot of a library root.
//!
//! The scanner walks a root directory and reports every directory together
//! with the archive files it directly contains. It never touches the
//! database; reconciliation against the persisted catalog happens in
//! [`reconcile`].

pub mod reconcile;

use crate::error::Result;
use std::cmp::Ordering;
use std::path::Path;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Archive extensions picked up by the scanner. Only ZIP-based containers
/// are decodable; the rest are carried through analysis as unsupported.
const BOOK_EXTENSIONS: &[&str] = &["cbz", "zip", "cbr", "rar", "cb7"];

/// A directory discovered on disk, candidate for a series.
#[derive(Debug, Clone)]
pub struct ScannedSeries {
    /// Target library ID stamped by the caller.
    pub library_id: i64,
    /// Directory name.
    pub name: String,
    /// Canonical directory path.
    pub url: String,
    /// Directory mtime truncated to milliseconds.
    pub file_last_modified: i64,
}

/// An archive file discovered on disk, candidate for a book.
#[derive(Debug, Clone)]
pub struct ScannedBook {
    /// Target library ID stamped by the caller.
    pub library_id: i64,
    /// File stem.
    pub name: String,
    /// Canonical file path.
    pub url: String,
    /// File mtime truncated to milliseconds.
    pub file_last_modified: i64,
    /// File size in bytes.
    pub file_size: i64,
}

/// On-disk snapshot: every discovered directory with its directly-contained
/// book files. A directory that currently enumerates zero book files is
/// still reported; whether to keep a persisted series for it is the
/// reconciler's decision.
pub type Snapshot = Vec<(ScannedSeries, Vec<ScannedBook>)>;

/// Check whether a filename carries a recognized archive extension.
pub fn is_book_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    BOOK_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

/// Walk a library root and produce a snapshot, stamping every entry with
/// the target library ID. Hidden entries (dot-prefixed) are skipped.
pub fn scan_root(library_id: i64, root: &Path) -> Result<Snapshot> {
    let start = std::time::Instant::now();
    let mut snapshot: Snapshot = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e.file_name().to_str().unwrap_or("")));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        let dir = entry.path();
        let meta = match std::fs::metadata(dir) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };

        let series = ScannedSeries {
            library_id,
            name: dir
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown")
                .to_string(),
            url: dir.to_string_lossy().to_string(),
            file_last_modified: mtime_millis(&meta),
        };

        let books = match scan_books(library_id, dir) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Skipping unlistable directory");
                continue;
            }
        };
        snapshot.push((series, books));
    }

    let total_books: usize = snapshot.iter().map(|(_, b)| b.len()).sum();
    tracing::info!(
        root = %root.display(),
        series = snapshot.len(),
        books = total_books,
        elapsed = ?start.elapsed(),
        "Filesystem scan complete"
    );

    Ok(snapshot)
}

/// List the book files directly contained in one directory.
fn scan_books(library_id: i64, dir: &Path) -> Result<Vec<ScannedBook>> {
    let mut books = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable file entry");
                continue;
            }
        };

        let file_name = entry.file_name();
        let name = file_name.to_str().unwrap_or("");
        if is_hidden(name) || !is_book_file(name) {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };

        let path = entry.path();
        books.push(ScannedBook {
            library_id,
            name: path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown")
                .to_string(),
            url: path.to_string_lossy().to_string(),
            file_last_modified: mtime_millis(&meta),
            file_size: meta.len() as i64,
        });
    }

    Ok(books)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// File mtime truncated to millisecond precision, guarding against
/// sub-millisecond timestamp jitter across platforms.
fn mtime_millis(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Natural string comparison: embedded numeric substrings compare by value,
/// so "book 2" sorts before "book 10".
pub fn natural_compare(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek(), b_chars.peek()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&ac), Some(&bc)) => {
                if ac.is_ascii_digit() && bc.is_ascii_digit() {
                    let a_val = take_number(&mut a_chars);
                    let b_val = take_number(&mut b_chars);

                    match a_val.cmp(&b_val) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                } else {
                    a_chars.next();
                    b_chars.next();

                    match ac.to_lowercase().cmp(bc.to_lowercase()) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
            }
        }
    }
}

/// Consume a digit run off the iterator by value. Peek-driven so the
/// character terminating the run stays in place for the caller.
fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u64 {
    let mut val: u64 = 0;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        val = val.saturating_mul(10).saturating_add(d as u64);
        chars.next();
    }
    val
}
