//! Allow-listed forwarding proxy for HLS streams.
//!
//! Fetches remote media on behalf of a browser player and rewrites HLS
//! playlists so that child playlists, segments, keys and subtitle tracks are
//! all requested back through the same proxy.

pub mod config;
pub mod error;
pub mod hls;
pub mod metrics;
pub mod server;
pub mod upstream;
