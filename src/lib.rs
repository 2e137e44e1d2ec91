//! comicshelf: a self-hosted media server for comic and book archives.
//!
//! Libraries map directories on disk to a catalog of series and books
//! stored in SQLite. A scanner reconciles the catalog against the
//! filesystem, an asynchronous task pipeline analyzes book archives, and
//! an HTTP API serves the catalog and individual pages.
//!
//! # Features
//!
//! - Incremental library scanning with change detection by mtime
//! - Natural ordering of books and pages (2 before 10)
//! - Archive analysis with per-book media status
//! - ComicInfo.xml metadata harvesting
//! - Page serving with on-the-fly conversion and resizing
//! - Thumbnail generation from the first page
//! - JPEG XL support for comic images

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Book lifecycle and page serving.
pub mod lifecycle;
/// Archive analysis and image handling.
pub mod media;
/// Filesystem scanning and catalog reconciliation.
pub mod scanner;
/// HTTP server.
pub mod server;
/// Asynchronous task pipeline.
pub mod tasks;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
