use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

/// Errors surfaced to the client by the proxy and static handlers.
///
/// Each variant maps to exactly one status code; nothing is retried.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Missing ?url")]
    MissingTarget,

    #[error("Invalid url: {0}")]
    InvalidTarget(String),

    #[error("Remote host not allowed")]
    HostNotAllowed(String),

    #[error("Proxy error: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Not found")]
    NotFound,

    #[error("Directory")]
    DirectoryForbidden,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingTarget | ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::HostNotAllowed(_) | ProxyError::DirectoryForbidden => {
                StatusCode::FORBIDDEN
            }
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            ProxyError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ProxyError::HostNotAllowed(host) => warn!("Rejected target host: {}", host),
            ProxyError::Upstream(e) => {
                crate::metrics::record_upstream_error();
                error!("Upstream fetch failed: {}", e);
            }
            ProxyError::Io(e) => error!("Filesystem error: {}", e),
            _ => {}
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
