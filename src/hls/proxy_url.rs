//! Mapping between upstream URLs and same-origin proxy links.

use crate::server::url_validation::AllowList;
use url::Url;

/// Path of the proxy endpoint every rewritten link points at.
pub const PROXY_PATH: &str = "/remote-media";

/// Build the same-origin proxy link for an absolute upstream URL.
///
/// Everything except ASCII alphanumerics and `-_.~` is percent-encoded, so the
/// `url` query parameter decodes back to exactly `absolute`.
pub fn to_proxy_url(absolute: &str) -> String {
    format!("{}?url={}", PROXY_PATH, urlencoding::encode(absolute))
}

/// Resolve `reference` against `base` (RFC 3986 joining).
///
/// Returns `None` when the reference cannot be turned into a valid URL.
pub fn resolve(base: &Url, reference: &str) -> Option<Url> {
    base.join(reference).ok()
}

/// Resolve `reference` and, if the result passes the allow-list, return its
/// proxy link. Anything else yields `None` and the caller keeps the original.
pub fn proxify(base: &Url, reference: &str, allow_list: &AllowList) -> Option<String> {
    let absolute = resolve(base, reference)?;
    allow_list
        .permits(&absolute)
        .then(|| to_proxy_url(absolute.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://movies.solargentinotv.com.ar/show/season1/index.m3u8").unwrap()
    }

    fn allow_list() -> AllowList {
        AllowList::new(["movies.solargentinotv.com.ar", "cdn.jsdelivr.net"])
    }

    #[test]
    fn proxy_url_escapes_reserved_characters() {
        let proxied = to_proxy_url("https://a.example/p?x=1&y=2#frag");
        assert_eq!(
            proxied,
            "/remote-media?url=https%3A%2F%2Fa.example%2Fp%3Fx%3D1%26y%3D2%23frag"
        );
    }

    #[test]
    fn proxy_url_round_trips() {
        let urls = [
            "https://movies.solargentinotv.com.ar/show/key.bin",
            "https://cdn.jsdelivr.net/a%20b/c.ts?token=a+b&exp=1",
            "http://movies.solargentinotv.com.ar/ünïcode/seg.ts",
        ];
        for original in urls {
            let proxied = to_proxy_url(original);
            let encoded = proxied.strip_prefix("/remote-media?url=").unwrap();
            assert!(!encoded.contains(['/', ':', '?', '&']));
            assert_eq!(urlencoding::decode(encoded).unwrap(), original);
        }
    }

    #[test]
    fn resolves_relative_segment() {
        let url = resolve(&base(), "seg001.ts").unwrap();
        assert_eq!(
            url.as_str(),
            "https://movies.solargentinotv.com.ar/show/season1/seg001.ts"
        );
    }

    #[test]
    fn resolves_parent_and_root_relative() {
        assert_eq!(
            resolve(&base(), "../keys/k.bin").unwrap().as_str(),
            "https://movies.solargentinotv.com.ar/show/keys/k.bin"
        );
        assert_eq!(
            resolve(&base(), "/abs/seg.ts").unwrap().as_str(),
            "https://movies.solargentinotv.com.ar/abs/seg.ts"
        );
        assert_eq!(
            resolve(&base(), "//cdn.jsdelivr.net/x.ts").unwrap().as_str(),
            "https://cdn.jsdelivr.net/x.ts"
        );
    }

    #[test]
    fn absolute_reference_replaces_base() {
        let url = resolve(&base(), "https://cdn.jsdelivr.net/x.ts").unwrap();
        assert_eq!(url.as_str(), "https://cdn.jsdelivr.net/x.ts");
    }

    #[test]
    fn proxify_allowed_reference() {
        let proxied = proxify(&base(), "seg001.ts", &allow_list()).unwrap();
        assert_eq!(
            proxied,
            "/remote-media?url=https%3A%2F%2Fmovies.solargentinotv.com.ar%2Fshow%2Fseason1%2Fseg001.ts"
        );
    }

    #[test]
    fn proxify_disallowed_reference() {
        assert!(proxify(&base(), "https://evil.example/seg.ts", &allow_list()).is_none());
        assert!(proxify(&base(), "data:text/plain,hi", &allow_list()).is_none());
    }

    #[test]
    fn proxify_unresolvable_reference() {
        assert!(proxify(&base(), "http://[broken", &allow_list()).is_none());
    }
}
