pub mod assets;
pub mod health;
pub mod media;
pub mod remote;

use crate::error::Result;
use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use std::path::{Component, Path, PathBuf};
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Join a client-supplied relative path onto `root`.
///
/// Returns `None` for anything that could escape `root` (`..`, absolute
/// paths, drive prefixes).
pub(crate) fn resolve_under(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(path)
}

/// Serve a single file with a MIME type guessed from its extension.
/// Range and conditional requests are handled by `ServeFile`.
pub(crate) async fn serve_file(path: PathBuf, req: Request) -> Result<Response> {
    match ServeFile::new(path).oneshot(req).await {
        Ok(response) => Ok(response.into_response()),
        Err(never) => match never {},
    }
}
