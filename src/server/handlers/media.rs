//! Local media browsing under `/remote-media/`.
//!
//! Serves thumbnails and other static files from the configured media
//! directory, with a plain HTML listing for directories.

use super::{resolve_under, serve_file};
use crate::{
    error::{ProxyError, Result},
    server::state::AppState,
};
use axum::{
    extract::{Path, Request, State},
    response::{Html, IntoResponse, Response},
};
use std::fmt::Write;
use std::path::Path as FsPath;
use tracing::debug;

/// `GET /remote-media/`: listing of the media directory itself.
pub async fn serve_media_root(State(state): State<AppState>, req: Request) -> Result<Response> {
    serve_media(&state, "", req).await
}

/// `GET /remote-media/{*path}`: a file or subdirectory of the media directory.
pub async fn serve_media_path(
    Path(path): Path<String>,
    State(state): State<AppState>,
    req: Request,
) -> Result<Response> {
    serve_media(&state, &path, req).await
}

async fn serve_media(state: &AppState, relative: &str, req: Request) -> Result<Response> {
    let target = resolve_under(&state.config.media_dir, relative).ok_or(ProxyError::NotFound)?;

    let metadata = tokio::fs::metadata(&target)
        .await
        .map_err(|_| ProxyError::NotFound)?;

    if metadata.is_dir() {
        debug!("Listing media directory: {}", target.display());
        let html = directory_listing(&target, relative).await?;
        return Ok(Html(html).into_response());
    }

    serve_file(target, req).await
}

/// Render the listing page for `dir`, linked as `/remote-media/<relative>/`.
async fn directory_listing(dir: &FsPath, relative: &str) -> Result<String> {
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|_| ProxyError::NotFound)?;

    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        // Follow symlinks when deciding whether an entry is a directory
        let is_dir = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        entries.push((name, is_dir));
    }
    entries.sort();

    let trimmed = relative.trim_end_matches('/');
    let base = if trimmed.is_empty() {
        "/remote-media/".to_string()
    } else {
        format!("/remote-media/{}/", trimmed)
    };
    let title = escape_html(&format!("Directory listing for /remote-media/{}", relative));

    let mut items = String::new();
    for (name, is_dir) in &entries {
        let suffix = if *is_dir { "/" } else { "" };
        let _ = write!(
            items,
            "<li><a href=\"{}\">{}</a></li>",
            escape_html(&format!("{}{}{}", base, name, suffix)),
            escape_html(name)
        );
    }

    let mut html = String::with_capacity(256 + items.len());
    let _ = writeln!(html, "<!doctype html>");
    let _ = writeln!(
        html,
        "<html><head><meta charset=\"utf-8\"><title>{}</title></head>",
        title
    );
    let _ = writeln!(html, "<body>");
    let _ = writeln!(html, "  <h1>{}</h1>", title);
    let _ = writeln!(html, "  <ul>{}</ul>", items);
    let _ = writeln!(html, "</body></html>");

    Ok(html)
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
