pub mod classify;
pub mod handlers;
pub mod state;
pub mod url_validation;

use crate::config::Config;
use crate::hls::PROXY_PATH;
use axum::{
    Router,
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use state::AppState;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the full router: proxy endpoint, local media browsing, health,
/// metrics and the application's own assets.
///
/// Separated from [`start`] so tests can drive the router without binding.
pub fn build_router(config: Config) -> Router {
    let state = AppState::new(config);

    info!(
        "Proxy allow-list has {} host(s)",
        state.allow_list.len()
    );

    Router::new()
        .route(PROXY_PATH, get(handlers::remote::proxy_remote_media))
        .route("/remote-media/", get(handlers::media::serve_media_root))
        .route(
            "/remote-media/{*path}",
            get(handlers::media::serve_media_path),
        )
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::render_metrics))
        .route("/", get(handlers::assets::serve_index))
        .route("/{*path}", get(handlers::assets::serve_asset))
        .layer(middleware::from_fn(version_header))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Tag every response with the running crate version.
async fn version_header(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response.headers_mut().insert(
        "x-streamgate-version",
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    let app = build_router(config);

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
