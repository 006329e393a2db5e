//! Line-oriented HLS playlist rewriting.
//!
//! Every URL-bearing position in a playlist (segment and variant lines, and
//! the `URI="..."` attribute of tags such as `EXT-X-KEY`, `EXT-X-MAP` and
//! `EXT-X-MEDIA`) is resolved against the playlist's own URL and, when the
//! target host is allowed, replaced by a proxy link. All other bytes are
//! preserved, including each line's terminator.
//!
//! Rewriting never fails: a reference that cannot be resolved or is not
//! allowed is left exactly as it was.

use super::proxy_url::proxify;
use crate::server::url_validation::AllowList;
use tracing::debug;
use url::Url;

const DIRECTIVE_MARKER: char = '#';
const URI_TOKEN: &[u8] = b"URI=\"";

/// Position of the quoted value of a tag's `URI` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UriAttribute<'a> {
    pub value: &'a str,
    /// Byte offset of the first character inside the quotes.
    pub start: usize,
    /// Byte offset of the closing quote.
    pub end: usize,
}

/// A single playlist line, without its terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestLine<'a> {
    Blank,
    /// `#`-prefixed tag or comment, possibly carrying a `URI` attribute.
    Directive { uri: Option<UriAttribute<'a>> },
    /// Media segment or child playlist reference (trimmed).
    Reference(&'a str),
}

impl<'a> ManifestLine<'a> {
    pub fn classify(line: &'a str) -> Self {
        let trimmed = line.trim().trim_start_matches('\u{feff}');

        if trimmed.is_empty() {
            ManifestLine::Blank
        } else if trimmed.starts_with(DIRECTIVE_MARKER) {
            ManifestLine::Directive {
                uri: find_uri_attribute(line),
            }
        } else {
            ManifestLine::Reference(trimmed)
        }
    }
}

/// Find the first `URI="..."` attribute of a tag line.
///
/// Attributes start after the tag's `:` or after a `,` outside quotes, so a
/// `URI="` sequence inside another attribute's quoted value or as the tail of
/// a longer attribute name is not a match. Empty or unterminated values count
/// as absent.
fn find_uri_attribute(line: &str) -> Option<UriAttribute<'_>> {
    let bytes = line.as_bytes();
    let mut i = line.find(':')? + 1;
    let mut in_quotes = false;
    let mut at_attribute_start = true;

    while i < bytes.len() {
        let b = bytes[i];

        if in_quotes {
            in_quotes = b != b'"';
            i += 1;
            continue;
        }

        if at_attribute_start {
            if b.is_ascii_whitespace() {
                i += 1;
                continue;
            }
            if bytes[i..].starts_with(URI_TOKEN) {
                let start = i + URI_TOKEN.len();
                let len = line[start..].find('"')?;
                if len == 0 {
                    return None;
                }
                return Some(UriAttribute {
                    value: &line[start..start + len],
                    start,
                    end: start + len,
                });
            }
        }

        at_attribute_start = b == b',';
        in_quotes = b == b'"';
        i += 1;
    }

    None
}

/// Result of rewriting one playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenManifest {
    pub body: String,
    /// Number of lines whose content changed.
    pub rewritten_lines: usize,
}

/// Rewrites playlists fetched from `base` so that allowed references point
/// back at the proxy.
#[derive(Debug, Clone, Copy)]
pub struct ManifestRewriter<'a> {
    base: &'a Url,
    allow_list: &'a AllowList,
}

impl<'a> ManifestRewriter<'a> {
    pub fn new(base: &'a Url, allow_list: &'a AllowList) -> Self {
        Self { base, allow_list }
    }

    pub fn rewrite(&self, text: &str) -> RewrittenManifest {
        let mut body = String::with_capacity(text.len() + text.len() / 2);
        let mut rewritten_lines = 0;

        for (line, terminator) in split_lines(text) {
            match self.rewrite_line(line) {
                Some(replacement) => {
                    rewritten_lines += 1;
                    body.push_str(&replacement);
                }
                None => body.push_str(line),
            }
            body.push_str(terminator);
        }

        debug!(
            "Rewrote {} playlist lines against {}",
            rewritten_lines, self.base
        );

        RewrittenManifest {
            body,
            rewritten_lines,
        }
    }

    /// Returns the replacement for `line`, or `None` to keep it verbatim.
    pub fn rewrite_line(&self, line: &str) -> Option<String> {
        match ManifestLine::classify(line) {
            ManifestLine::Blank | ManifestLine::Directive { uri: None } => None,
            ManifestLine::Directive { uri: Some(attr) } => {
                let proxied = proxify(self.base, attr.value, self.allow_list)?;
                Some(format!(
                    "{}{}{}",
                    &line[..attr.start],
                    proxied,
                    &line[attr.end..]
                ))
            }
            ManifestLine::Reference(reference) => {
                proxify(self.base, reference, self.allow_list)
            }
        }
    }
}

/// Split `text` into `(line, terminator)` pairs.
///
/// `\n`, `\r\n` and a lone `\r` all end a line. The final line has an empty
/// terminator when the text does not end with one, and no pair is produced
/// for the position after a trailing terminator.
fn split_lines(text: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let (line, terminator, remainder) = match rest.find(['\r', '\n']) {
            Some(i) => {
                let len = if rest[i..].starts_with("\r\n") { 2 } else { 1 };
                (&rest[..i], &rest[i..i + len], &rest[i + len..])
            }
            None => (rest, "", ""),
        };
        rest = remainder;
        Some((line, terminator))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST_URL: &str = "https://movies.solargentinotv.com.ar/show/index.m3u8";

    fn allow_list() -> AllowList {
        AllowList::new(["movies.solargentinotv.com.ar", "cdn.jsdelivr.net"])
    }

    fn rewrite(text: &str, manifest_url: &str) -> String {
        let base = Url::parse(manifest_url).unwrap();
        let allow = allow_list();
        ManifestRewriter::new(&base, &allow).rewrite(text).body
    }

    // ---- Classification ----

    #[test]
    fn classifies_blank_lines() {
        assert_eq!(ManifestLine::classify(""), ManifestLine::Blank);
        assert_eq!(ManifestLine::classify("   \t"), ManifestLine::Blank);
    }

    #[test]
    fn classifies_plain_reference_trimmed() {
        assert_eq!(
            ManifestLine::classify("  seg1.ts  "),
            ManifestLine::Reference("seg1.ts")
        );
    }

    #[test]
    fn classifies_directive_without_uri() {
        assert_eq!(
            ManifestLine::classify("#EXTINF:10.0,"),
            ManifestLine::Directive { uri: None }
        );
        assert_eq!(
            ManifestLine::classify("# just a comment"),
            ManifestLine::Directive { uri: None }
        );
    }

    #[test]
    fn bom_prefixed_header_is_directive() {
        assert_eq!(
            ManifestLine::classify("\u{feff}#EXTM3U"),
            ManifestLine::Directive { uri: None }
        );
    }

    #[test]
    fn finds_uri_attribute_offsets() {
        let line = r#"#EXT-X-MAP:URI="init.mp4",BYTERANGE="720@0""#;
        let attr = find_uri_attribute(line).unwrap();
        assert_eq!(attr.value, "init.mp4");
        assert_eq!(&line[attr.start..attr.end], "init.mp4");
        assert_eq!(&line[attr.end..attr.end + 1], "\"");
    }

    #[test]
    fn ignores_uri_suffix_of_longer_attribute_name() {
        let line = r#"#EXT-X-KEY:METHOD=AES-128,KEYURI="nope.bin""#;
        assert_eq!(find_uri_attribute(line), None);
    }

    #[test]
    fn ignores_uri_inside_quoted_value() {
        let line = r#"#EXT-X-SESSION-DATA:DATA-ID="a",VALUE="x,URI=",URI="real.json""#;
        let attr = find_uri_attribute(line).unwrap();
        assert_eq!(attr.value, "real.json");
    }

    #[test]
    fn empty_or_unterminated_uri_is_absent() {
        assert_eq!(find_uri_attribute(r#"#EXT-X-MAP:URI="""#), None);
        assert_eq!(find_uri_attribute(r#"#EXT-X-MAP:URI="init.mp4"#), None);
    }

    // ---- Rewriting ----

    #[test]
    fn rewrites_key_uri_relative_to_manifest() {
        let out = rewrite(
            "#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\n",
            "https://movies.solargentinotv.com.ar/show/key.bin",
        );
        assert_eq!(
            out,
            "#EXT-X-KEY:METHOD=AES-128,URI=\"/remote-media?url=https%3A%2F%2Fmovies.solargentinotv.com.ar%2Fshow%2Fkey.bin\"\n"
        );
    }

    #[test]
    fn keeps_attributes_after_uri() {
        let out = rewrite(
            "#EXT-X-KEY:METHOD=AES-128,URI=\"k.bin\",IV=0x1234\n",
            MANIFEST_URL,
        );
        assert!(out.starts_with("#EXT-X-KEY:METHOD=AES-128,URI=\"/remote-media?url="));
        assert!(out.ends_with("k.bin\",IV=0x1234\n"));
    }

    #[test]
    fn plain_reference_on_disallowed_host_unchanged() {
        let text = "#EXTINF:4.0,\nsegment001.ts\n";
        assert_eq!(rewrite(text, "https://evil.example/live/index.m3u8"), text);
    }

    #[test]
    fn disallowed_uri_attribute_left_untouched() {
        let text = "#EXT-X-KEY:METHOD=AES-128,URI=\"https://keys.evil.example/k\"\n";
        assert_eq!(rewrite(text, MANIFEST_URL), text);
    }

    #[test]
    fn rewrites_plain_reference_and_variant() {
        let text = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nlow/index.m3u8\n";
        let out = rewrite(text, MANIFEST_URL);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "#EXT-X-STREAM-INF:BANDWIDTH=800000");
        assert_eq!(
            lines[2],
            "/remote-media?url=https%3A%2F%2Fmovies.solargentinotv.com.ar%2Fshow%2Flow%2Findex.m3u8"
        );
    }

    #[test]
    fn absolute_reference_to_other_allowed_host() {
        let out = rewrite("https://cdn.jsdelivr.net/a/seg.ts", MANIFEST_URL);
        assert_eq!(
            out,
            "/remote-media?url=https%3A%2F%2Fcdn.jsdelivr.net%2Fa%2Fseg.ts"
        );
    }

    #[test]
    fn whitespace_around_reference_is_dropped_on_rewrite() {
        let out = rewrite("  seg.ts  \n", MANIFEST_URL);
        assert_eq!(
            out,
            "/remote-media?url=https%3A%2F%2Fmovies.solargentinotv.com.ar%2Fshow%2Fseg.ts\n"
        );
    }

    #[test]
    fn preserves_line_count_and_blank_positions() {
        let text = "#EXTM3U\n\n#EXTINF:4,\na.ts\n   \n#EXTINF:4,\nb.ts\n\n";
        let out = rewrite(text, MANIFEST_URL);
        let before: Vec<&str> = text.split('\n').collect();
        let after: Vec<&str> = out.split('\n').collect();
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(&after) {
            if b.trim().is_empty() || b.starts_with('#') {
                assert_eq!(b, a);
            }
        }
    }

    #[test]
    fn trailing_newline_preserved_or_absent() {
        assert!(rewrite("#EXTM3U\na.ts\n", MANIFEST_URL).ends_with('\n'));
        assert!(!rewrite("#EXTM3U\na.ts", MANIFEST_URL).ends_with('\n'));
        assert_eq!(rewrite("", MANIFEST_URL), "");
    }

    #[test]
    fn crlf_terminators_preserved() {
        let out = rewrite("#EXTM3U\r\n#EXTINF:4,\r\na.ts\r\n", MANIFEST_URL);
        assert!(out.starts_with("#EXTM3U\r\n#EXTINF:4,\r\n/remote-media?url="));
        assert!(out.ends_with("a.ts\r\n"));
        assert_eq!(out.matches("\r\n").count(), 3);
    }

    #[test]
    fn bare_cr_terminators_split_lines() {
        let base = Url::parse(MANIFEST_URL).unwrap();
        let allow = allow_list();
        let result = ManifestRewriter::new(&base, &allow).rewrite("#EXTM3U\r#EXTINF:4,\rseg1.ts\r");

        assert_eq!(result.rewritten_lines, 1);
        assert_eq!(
            result.body,
            "#EXTM3U\r#EXTINF:4,\r/remote-media?url=https%3A%2F%2Fmovies.solargentinotv.com.ar%2Fshow%2Fseg1.ts\r"
        );
    }

    #[test]
    fn mixed_terminators_kept_per_line() {
        let pairs: Vec<(&str, &str)> = split_lines("a\rb\r\nc\nd").collect();
        assert_eq!(pairs, vec![("a", "\r"), ("b", "\r\n"), ("c", "\n"), ("d", "")]);

        let blanks: Vec<(&str, &str)> = split_lines("\r\r\n\n").collect();
        assert_eq!(blanks, vec![("", "\r"), ("", "\r\n"), ("", "\n")]);
    }

    #[test]
    fn hostile_input_never_panics() {
        let text = "#EXT-X-KEY:URI=\"http://[::1\"\nhttp://[broken\n#EXT-X-MAP:URI=\"ü\u{0}\"\n\u{feff}\n#:\n#EXT-X-KEY:URI=";
        let out = rewrite(text, MANIFEST_URL);
        assert_eq!(out.lines().count(), text.lines().count());
        assert!(out.contains("http://[broken"));
    }

    #[test]
    fn counts_rewritten_lines() {
        let base = Url::parse(MANIFEST_URL).unwrap();
        let allow = allow_list();
        let result = ManifestRewriter::new(&base, &allow).rewrite(
            "#EXTM3U\n#EXT-X-MAP:URI=\"init.mp4\"\n#EXTINF:4,\na.ts\nhttps://evil.example/b.ts\n",
        );
        assert_eq!(result.rewritten_lines, 2);
    }

    #[test]
    fn rewrites_media_and_iframe_tags() {
        let text = concat!(
            "#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"subs\",NAME=\"es\",URI=\"subs/es.m3u8\"\n",
            "#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=1000,URI=\"iframe.m3u8\"\n",
        );
        let out = rewrite(text, MANIFEST_URL);
        assert!(out.contains("URI=\"/remote-media?url=https%3A%2F%2Fmovies.solargentinotv.com.ar%2Fshow%2Fsubs%2Fes.m3u8\""));
        assert!(out.contains("URI=\"/remote-media?url=https%3A%2F%2Fmovies.solargentinotv.com.ar%2Fshow%2Fiframe.m3u8\""));
        assert!(out.contains("NAME=\"es\""));
    }
}
