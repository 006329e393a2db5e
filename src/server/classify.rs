use url::Url;

/// Content types that mark an upstream body as an HLS playlist.
const PLAYLIST_CONTENT_TYPES: [&str; 4] = [
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "audio/mpegurl",
    "audio/x-mpegurl",
];

/// How a successful upstream response is relayed to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Buffered, rewritten, served uncached.
    Manifest,
    /// Streamed unmodified with a WebVTT content type.
    Subtitle,
    /// Streamed unmodified in bounded chunks.
    Binary,
}

impl ResponseKind {
    /// Pick the relay strategy for `target`.
    ///
    /// Checked in order: playlist (URL or content type), subtitle (URL path
    /// extension), everything else. The URL wins when it disagrees with the
    /// upstream content type.
    pub fn classify(target: &Url, content_type: Option<&str>) -> Self {
        if looks_like_playlist(target, content_type) {
            ResponseKind::Manifest
        } else if target.path().to_ascii_lowercase().ends_with(".vtt") {
            ResponseKind::Subtitle
        } else {
            ResponseKind::Binary
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Manifest => "manifest",
            ResponseKind::Subtitle => "subtitle",
            ResponseKind::Binary => "binary",
        }
    }
}

fn looks_like_playlist(target: &Url, content_type: Option<&str>) -> bool {
    if target.as_str().to_ascii_lowercase().contains(".m3u8") {
        return true;
    }

    content_type.is_some_and(|ct| {
        let ct = ct.to_ascii_lowercase();
        PLAYLIST_CONTENT_TYPES.iter().any(|t| ct.contains(t))
    })
}
