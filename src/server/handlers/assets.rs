use super::{resolve_under, serve_file};
use crate::{
    error::{ProxyError, Result},
    server::state::AppState,
};
use axum::{
    extract::{Path, Request, State},
    response::Response,
};
use tracing::debug;

/// `GET /`: the player page.
pub async fn serve_index(State(state): State<AppState>, req: Request) -> Result<Response> {
    let index = resolve_under(&state.config.static_root, &state.config.index_file)
        .ok_or(ProxyError::NotFound)?;

    if !tokio::fs::metadata(&index).await.is_ok_and(|m| m.is_file()) {
        return Err(ProxyError::NotFound);
    }

    serve_file(index, req).await
}

/// `GET /{*path}`: the application's own scripts, styles and pages.
/// Directories are never listed here.
pub async fn serve_asset(
    Path(path): Path<String>,
    State(state): State<AppState>,
    req: Request,
) -> Result<Response> {
    let target =
        resolve_under(&state.config.static_root, &path).ok_or(ProxyError::NotFound)?;

    let metadata = tokio::fs::metadata(&target)
        .await
        .map_err(|_| ProxyError::NotFound)?;

    if metadata.is_dir() {
        debug!("Refusing directory request: {}", path);
        return Err(ProxyError::DirectoryForbidden);
    }

    serve_file(target, req).await
}
