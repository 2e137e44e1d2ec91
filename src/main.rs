//! comicshelf server entry point.

use clap::Parser;
use comicshelf::{
    config::{Cli, Command, Config, LibraryCommand},
    db::Database,
    lifecycle::BookLifecycle,
    scanner::reconcile::{LibraryScanner, ScanOptions},
    server,
    tasks::{Task, TaskHandler, TaskQueue},
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    match cli.command {
        Some(Command::Init { force }) => cmd_init(force),
        Some(Command::Library { action }) => cmd_library(action, &config),
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => cmd_serve(config, None).await,
    }
}

/// Initialize config and database.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    let config = Config::default();
    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nEdit config.toml to configure your server.");
    println!("Then run: comicshelf library add <name> --path /path/to/comics");

    Ok(())
}

/// Library management commands.
fn cmd_library(action: LibraryCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        LibraryCommand::Add { name, path } => {
            if !path.exists() {
                anyhow::bail!("Path does not exist: {}", path.display());
            }
            if !path.is_dir() {
                anyhow::bail!("Path is not a directory: {}", path.display());
            }

            let library = db.create_library(&name, &path.to_string_lossy())?;
            println!("Added library: {} -> {} (id: {})", name, path.display(), library.id);
        }

        LibraryCommand::Del { name } => match db.get_library_by_name(&name)? {
            Some(library) => {
                db.delete_library(library.id)?;
                println!("Deleted library: {}", name);
            }
            None => println!("Library not found: {}", name),
        },

        LibraryCommand::List => {
            let libraries = db.list_libraries()?;
            if libraries.is_empty() {
                println!("No libraries found.");
            } else {
                println!("{:<6} {:<20} ROOT", "ID", "NAME");
                println!("{}", "-".repeat(60));
                for lib in libraries {
                    println!("{:<6} {:<20} {}", lib.id, lib.name, lib.root);
                }
            }
        }

        LibraryCommand::Scan { all, name } => {
            let libraries = if all {
                db.list_libraries()?
            } else if let Some(name) = name {
                db.get_library_by_name(&name)?
                    .map(|l| vec![l])
                    .unwrap_or_default()
            } else {
                db.list_libraries()?
            };

            if libraries.is_empty() {
                println!("No libraries to scan.");
                return Ok(());
            }

            let scanner = LibraryScanner::new(
                db.clone(),
                ScanOptions {
                    keep_empty_series: config.scan.keep_empty_series,
                },
            );
            let lifecycle = BookLifecycle::new(db.clone(), config.media.thumbnail_size);

            for lib in libraries {
                println!("Scanning library: {} ({})", lib.name, lib.root);
                let outcome = scanner.scan_root_folder(&lib)?;
                println!(
                    "  {} created, {} updated, {} unchanged, {} deleted",
                    outcome.series_created,
                    outcome.series_updated,
                    outcome.series_unchanged,
                    outcome.series_deleted
                );

                for book_id in outcome.books_to_analyze {
                    lifecycle.analyze_and_persist(book_id)?;
                    lifecycle.refresh_metadata(book_id)?;
                }
            }
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comicshelf=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::open(&config.database.path)?;

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        "Starting comicshelf server"
    );

    let (queue, rx) = TaskQueue::new();
    let scanner = LibraryScanner::new(
        db.clone(),
        ScanOptions {
            keep_empty_series: config.scan.keep_empty_series,
        },
    );
    let lifecycle = BookLifecycle::new(db.clone(), config.media.thumbnail_size);
    let handler = TaskHandler::new(db.clone(), scanner, lifecycle, queue.clone());
    handler.spawn(rx)?;

    let libraries = db.list_libraries()?;
    if libraries.is_empty() {
        tracing::warn!(
            "No libraries configured. Add one with: comicshelf library add <name> --path /path/to/comics"
        );
    }

    // Initial scan of every library on startup.
    for lib in &libraries {
        queue.submit(Task::ScanLibrary { library_id: lib.id });
    }

    // Background rescan if enabled.
    if config.scan.interval_seconds > 0 {
        let rescan_queue = queue.clone();
        let rescan_db = db.clone();
        let interval = Duration::from_secs(config.scan.interval_seconds);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip first immediate tick

            loop {
                ticker.tick().await;
                tracing::debug!("Running scheduled library rescan");

                match rescan_db.list_libraries() {
                    Ok(libraries) => {
                        for lib in libraries {
                            rescan_queue.submit(Task::ScanLibrary { library_id: lib.id });
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Scheduled rescan failed"),
                }
            }
        });
    }

    let state = server::AppState::new(config.clone(), db, queue);
    let app = server::create_router(state);

    let listener = TcpListener::bind(config.server.bind).await?;
    tracing::info!(address = %config.server.bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
