use std::collections::HashSet;
use std::sync::Arc;
use url::{Host, Url};

/// Fixed set of upstream hosts the proxy may contact.
///
/// Built once from configuration and shared read-only between handlers.
/// Membership is exact: no subdomain wildcards, no port rules.
///
/// Hostnames are compared lower-cased, which matches how [`Url`] normalizes
/// domain names while parsing. IPv6 literals are stored without brackets.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    hosts: Arc<HashSet<String>>,
}

impl AllowList {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|h| normalize_host(h.as_ref()))
            .filter(|h| !h.is_empty())
            .collect();

        Self {
            hosts: Arc::new(hosts),
        }
    }

    /// Returns `true` if `url` parses, uses `http`/`https`, and names a
    /// permitted host. Unparseable input is simply not allowed.
    pub fn is_allowed(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|parsed| self.permits(&parsed))
    }

    /// Same check as [`AllowList::is_allowed`] for an already parsed URL.
    pub fn permits(&self, url: &Url) -> bool {
        match url.scheme() {
            "http" | "https" => {}
            _ => return false,
        }

        match url.host() {
            Some(Host::Domain(domain)) => self.hosts.contains(&domain.to_ascii_lowercase()),
            Some(Host::Ipv4(ip)) => self.hosts.contains(&ip.to_string()),
            Some(Host::Ipv6(ip)) => self.hosts.contains(&ip.to_string()),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

fn normalize_host(host: &str) -> String {
    host.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase()
}
