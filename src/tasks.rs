//! Asynchronous task pipeline.
//!
//! Producers enqueue typed work items fire-and-forget; a single worker
//! thread drains the queue and executes tasks one at a time, in order. A
//! failed task is logged with its descriptor and timing, then dropped.
//! There is no retry and no cancellation; re-running a library scan is
//! idempotent and serves as the recovery mechanism.

use crate::db::{Database, MediaStatus};
use crate::error::{AppError, Result};
use crate::lifecycle::BookLifecycle;
use crate::scanner::reconcile::LibraryScanner;
use std::fmt;
use std::time::Instant;
use tokio::sync::mpsc;

/// One unit of asynchronous work, carrying a numeric entity ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Reconcile one library against its root directory.
    ScanLibrary {
        /// Target library.
        library_id: i64,
    },
    /// Analyze one book's archive.
    AnalyzeBook {
        /// Target book.
        book_id: i64,
    },
    /// Re-derive one book's thumbnail.
    GenerateBookThumbnail {
        /// Target book.
        book_id: i64,
    },
    /// Harvest embedded metadata for one book.
    RefreshBookMetadata {
        /// Target book.
        book_id: i64,
    },
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::ScanLibrary { library_id } => write!(f, "ScanLibrary({})", library_id),
            Task::AnalyzeBook { book_id } => write!(f, "AnalyzeBook({})", book_id),
            Task::GenerateBookThumbnail { book_id } => {
                write!(f, "GenerateBookThumbnail({})", book_id)
            }
            Task::RefreshBookMetadata { book_id } => {
                write!(f, "RefreshBookMetadata({})", book_id)
            }
        }
    }
}

/// Producer handle: enqueue is fire-and-forget, no result flows back.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Task>,
}

impl TaskQueue {
    /// Create a queue and the receiver end for the worker.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Task>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a task. Dropped with a warning if the worker is gone.
    pub fn submit(&self, task: Task) {
        if self.tx.send(task).is_err() {
            tracing::warn!(task = %task, "Task worker is gone, dropping task");
        }
    }
}

/// The single consumer: executes tasks against the scanner and lifecycle,
/// enqueueing follow-up work.
#[derive(Clone)]
pub struct TaskHandler {
    db: Database,
    scanner: LibraryScanner,
    lifecycle: BookLifecycle,
    queue: TaskQueue,
}

impl TaskHandler {
    /// Wire a handler to its collaborators. `queue` is used for follow-up
    /// tasks (analysis after scan, metadata refresh after analysis).
    pub fn new(
        db: Database,
        scanner: LibraryScanner,
        lifecycle: BookLifecycle,
        queue: TaskQueue,
    ) -> Self {
        Self {
            db,
            scanner,
            lifecycle,
            queue,
        }
    }

    /// Execute one task, logging descriptor, duration and outcome. Failures
    /// never propagate; the worker loop must survive any task.
    pub fn execute(&self, task: Task) {
        let start = Instant::now();
        match self.run(task) {
            Ok(()) => {
                tracing::info!(task = %task, elapsed = ?start.elapsed(), "Task complete");
            }
            Err(e) => {
                tracing::error!(task = %task, elapsed = ?start.elapsed(), error = %e, "Task failed");
            }
        }
    }

    fn run(&self, task: Task) -> Result<()> {
        match task {
            Task::ScanLibrary { library_id } => {
                let library = self
                    .db
                    .get_library(library_id)?
                    .ok_or_else(|| AppError::NotFound(format!("Library {}", library_id)))?;

                let outcome = self.scanner.scan_root_folder(&library)?;
                for book_id in outcome.books_to_analyze {
                    self.queue.submit(Task::AnalyzeBook { book_id });
                }
                Ok(())
            }
            Task::AnalyzeBook { book_id } => {
                let status = self.lifecycle.analyze_and_persist(book_id)?;
                if status == MediaStatus::Ready {
                    self.queue.submit(Task::RefreshBookMetadata { book_id });
                }
                Ok(())
            }
            Task::GenerateBookThumbnail { book_id } => {
                self.lifecycle.regenerate_thumbnail_and_persist(book_id)
            }
            Task::RefreshBookMetadata { book_id } => self.lifecycle.refresh_metadata(book_id),
        }
    }

    /// Spawn the worker thread draining `rx` until every sender is dropped.
    pub fn spawn(self, mut rx: mpsc::UnboundedReceiver<Task>) -> Result<std::thread::JoinHandle<()>> {
        let handle = std::thread::Builder::new()
            .name("task-worker".to_string())
            .spawn(move || {
                tracing::info!("Task worker started");
                while let Some(task) = rx.blocking_recv() {
                    self.execute(task);
                }
                tracing::info!("Task worker stopped");
            })?;
        Ok(handle)
    }
}
