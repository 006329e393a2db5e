use crate::{
    error::{ProxyError, Result},
    hls::ManifestRewriter,
    metrics,
    server::{classify::ResponseKind, state::AppState},
    upstream::{self, ProxyRequest},
};
use axum::{
    body::Body,
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use std::time::Instant;
use tracing::{debug, info};
use url::Url;

/// Upper bound on the size of each body chunk relayed to the client.
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl; charset=utf-8";
const SUBTITLE_CONTENT_TYPE: &str = "text/vtt; charset=utf-8";

/// Upstream headers relayed on streamed responses when present.
const PASSTHROUGH_HEADERS: [header::HeaderName; 3] = [
    header::CONTENT_LENGTH,
    header::ACCEPT_RANGES,
    header::CONTENT_RANGE,
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RemoteMediaParams {
    url: Option<String>,
}

impl RemoteMediaParams {
    /// Parse the raw query string. When `url` is repeated the first one wins.
    pub fn from_query(query: Option<&str>) -> Self {
        let url = query.and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "url")
                .map(|(_, value)| value.into_owned())
        });
        Self { url }
    }
}

/// `GET /remote-media?url=...`: fetch an allowed upstream resource and relay it.
///
/// Playlists are buffered and rewritten so every nested reference comes back
/// through this endpoint; subtitles and media bytes are streamed.
pub async fn proxy_remote_media(
    RawQuery(query): RawQuery,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    let start = Instant::now();
    let params = RemoteMediaParams::from_query(query.as_deref());
    let result = relay(params, &state, &headers).await;

    let status = match &result {
        Ok(response) => response.status(),
        Err(e) => e.status(),
    };
    metrics::record_request("remote_media", status.as_u16());
    metrics::record_duration("remote_media", start);

    result
}

async fn relay(params: RemoteMediaParams, state: &AppState, headers: &HeaderMap) -> Result<Response> {
    let raw_url = params
        .url
        .filter(|u| !u.is_empty())
        .ok_or(ProxyError::MissingTarget)?;

    let target = Url::parse(&raw_url).map_err(|_| ProxyError::InvalidTarget(raw_url.clone()))?;

    if !state.allow_list.permits(&target) {
        return Err(ProxyError::HostNotAllowed(
            target.host_str().unwrap_or_default().to_string(),
        ));
    }

    info!("Proxying remote media: {}", target);

    let request = ProxyRequest::from_headers(target, headers);
    let upstream = upstream::fetch(&state.http_client, &request).await?;

    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if status.is_client_error() || status.is_server_error() {
        return relay_upstream_error(upstream, content_type).await;
    }

    let kind = ResponseKind::classify(&request.target, content_type.as_deref());
    debug!(
        "Relaying {} as {} (upstream {})",
        request.target,
        kind.as_str(),
        status
    );

    match kind {
        ResponseKind::Manifest => relay_manifest(upstream, state).await,
        ResponseKind::Subtitle => Ok(relay_subtitle(upstream)),
        ResponseKind::Binary => Ok(relay_stream(upstream, content_type)),
    }
}

/// Upstream said no: hand its status, content type and body back verbatim.
async fn relay_upstream_error(
    upstream: reqwest::Response,
    content_type: Option<String>,
) -> Result<Response> {
    let status = upstream.status();
    let body = upstream.bytes().await?;

    info!("Upstream returned {}, passing through", status);

    Ok((
        status,
        [(
            header::CONTENT_TYPE,
            content_type.unwrap_or_else(|| "text/plain".to_string()),
        )],
        body,
    )
        .into_response())
}

async fn relay_manifest(upstream: reqwest::Response, state: &AppState) -> Result<Response> {
    // Relative references resolve against where the playlist actually came from
    let base = upstream.url().clone();
    let text = upstream.text().await?;

    let rewritten = ManifestRewriter::new(&base, &state.allow_list).rewrite(&text);
    metrics::record_manifest_rewrite(rewritten.rewritten_lines);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, MANIFEST_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        rewritten.body,
    )
        .into_response())
}

fn relay_subtitle(upstream: reqwest::Response) -> Response {
    let status = upstream.status();

    (
        status,
        [
            (header::CONTENT_TYPE, SUBTITLE_CONTENT_TYPE),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        chunked_body(upstream),
    )
        .into_response()
}

fn relay_stream(upstream: reqwest::Response, content_type: Option<String>) -> Response {
    let status = upstream.status();

    let mut headers = HeaderMap::new();
    for name in PASSTHROUGH_HEADERS {
        if let Some(value) = upstream.headers().get(&name) {
            headers.insert(name, value.clone());
        }
    }
    headers.insert(
        header::CONTENT_TYPE,
        content_type
            .and_then(|ct| HeaderValue::from_str(&ct).ok())
            .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );

    (status, headers, chunked_body(upstream)).into_response()
}

/// Stream the upstream body without buffering it, re-slicing anything larger
/// than [`STREAM_CHUNK_SIZE`].
///
/// The upstream response is owned by the stream, so dropping the body (client
/// gone, or fully sent) releases the upstream connection.
fn chunked_body(upstream: reqwest::Response) -> Body {
    let chunks = upstream
        .bytes_stream()
        .flat_map(|item| {
            let pieces: Vec<reqwest::Result<Bytes>> = match item {
                Ok(bytes) => split_chunks(bytes).into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            stream::iter(pieces)
        });

    Body::from_stream(chunks)
}

/// Split `bytes` into zero-copy slices of at most [`STREAM_CHUNK_SIZE`].
fn split_chunks(mut bytes: Bytes) -> Vec<Bytes> {
    let mut pieces = Vec::with_capacity(bytes.len().div_ceil(STREAM_CHUNK_SIZE).max(1));

    while bytes.len() > STREAM_CHUNK_SIZE {
        pieces.push(bytes.split_to(STREAM_CHUNK_SIZE));
    }
    if !bytes.is_empty() {
        pieces.push(bytes);
    }

    pieces
}
