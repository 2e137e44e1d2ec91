//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let library_routes = Router::new()
        .route("/", get(handlers::library_list))
        .route("/{id}", get(handlers::library_get))
        .route("/{id}/scan", post(handlers::library_scan))
        .route("/{id}/series", get(handlers::library_series));

    let series_routes = Router::new()
        .route("/{id}", get(handlers::series_get))
        .route("/{id}/books", get(handlers::series_books));

    let book_routes = Router::new()
        .route("/{id}", get(handlers::book_get))
        .route("/{id}/media", get(handlers::book_media))
        .route("/{id}/analyze", post(handlers::book_analyze))
        .route("/{id}/metadata/refresh", post(handlers::book_refresh_metadata))
        .route("/{id}/thumbnail", get(handlers::book_thumbnail))
        .route(
            "/{id}/thumbnail/regenerate",
            post(handlers::book_regenerate_thumbnail),
        )
        .route("/{id}/pages/{page}", get(handlers::book_page))
        .route(
            "/{id}/pages/{page}/thumbnail",
            get(handlers::book_page_thumbnail),
        );

    Router::new()
        .route("/api", get(handlers::api_info))
        .nest("/api/libraries", library_routes)
        .nest("/api/series", series_routes)
        .nest("/api/books", book_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
