//! HLS playlist handling: proxy link construction and playlist rewriting.

pub mod proxy_url;
pub mod rewrite;

pub use proxy_url::{PROXY_PATH, proxify, resolve, to_proxy_url};
pub use rewrite::{ManifestLine, ManifestRewriter, RewrittenManifest, UriAttribute};
