use crate::upstream::DEFAULT_TIMEOUT_SECS;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Upstream hosts permitted in dev mode when `ALLOWED_HOSTS` is unset.
pub const DEV_ALLOWED_HOSTS: [&str; 4] = [
    "cdn.jsdelivr.net",
    "movies.solargentinotv.com.ar",
    "old.movies.solargentinotv.com.ar",
    "akira.satvplus.com.ar",
];

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub is_dev: bool,
    /// Hosts the proxy may fetch from; fixed for the process lifetime
    pub allowed_hosts: Vec<String>,
    /// Root of the application's own static assets
    pub static_root: PathBuf,
    /// File under `static_root` served for `GET /`
    pub index_file: String,
    /// Local directory browsed under `/remote-media/`
    pub media_dir: PathBuf,
    /// Connect/read timeout for upstream fetches, in seconds
    pub upstream_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT and
    /// ALLOWED_HOSTS are required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        // Port: required in prod, defaults to 4343 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "4343".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        // Allow-list: required in prod, defaults to the known media hosts in dev
        let allowed_hosts = match env::var("ALLOWED_HOSTS") {
            Ok(hosts) => parse_host_list(&hosts),
            Err(_) if is_dev => DEV_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect(),
            Err(_) => return Err("ALLOWED_HOSTS is required in production".into()),
        };

        if allowed_hosts.is_empty() {
            return Err("ALLOWED_HOSTS must name at least one host".into());
        }

        let static_root = env::var("STATIC_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let index_file = env::var("INDEX_FILE").unwrap_or_else(|_| "watch.html".to_string());

        let media_dir = env::var("REMOTE_MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./remote-media"));

        let upstream_timeout_secs = match env::var("UPSTREAM_TIMEOUT_SECS") {
            Ok(v) => v.parse()?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Config {
            port,
            is_dev,
            allowed_hosts,
            static_root,
            index_file,
            media_dir,
            upstream_timeout_secs,
        })
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}
