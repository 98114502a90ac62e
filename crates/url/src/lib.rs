//! Uniform addressing over filesystem paths and object-storage buckets.
//!
//! A [`Url`] is the single value both the filesystem and object-storage
//! backends are constructed from and dispatched by (scheme-keyed
//! construction, see the design note in spec.md §9 — backend selection
//! should never leak a scheme check to call sites; it's centralized in
//! [`Scheme::detect`] and the planner).

pub mod classify;
pub mod error;

use std::fmt;
use std::path::{Path, PathBuf};

pub use crate::classify::{Kind, Shape, SourceSpec, TargetSpec, classify, recursive_target, target_for_shape_b};
use crate::error::{ErrorKind, Result};

/// The storage substrate a [`Url`] addresses.
///
/// Object storage schemes are split into `Http`/`Https` rather than
/// collapsed into one "s3" variant: a URL's scheme is exactly what it
/// was written with, and the backend built from it decides how to
/// speak to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Scheme {
    File,
    Http,
    Https,
}
impl Scheme {
    pub fn is_object_storage(&self) -> bool {
        matches!(self, Scheme::Http | Scheme::Https)
    }
}
impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scheme::File => "file",
            Scheme::Http => "http",
            Scheme::Https => "https",
        })
    }
}

/// A uniform address: a filesystem path or an object-storage bucket/key.
///
/// # Invariants
/// - `path` for object storage always decomposes as `/<bucket>/<key>`
///   (key may be empty, meaning "the bucket root").
/// - `separator` is `/` for object storage, [`std::path::MAIN_SEPARATOR`]
///   for the filesystem.
/// - `virtual_host` is derived once, at construction, from `host`
///   matching the virtual-host-style bucket pattern; callers never need
///   to re-derive it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Url {
    pub scheme: Scheme,
    pub host: String,
    pub path: String,
    pub separator: char,
    pub virtual_host: bool,
}

/// Matches AWS S3 and GCS virtual-host-style bucket hostnames, e.g.
/// `my-bucket.s3.us-west-2.amazonaws.com` or
/// `my-bucket.storage.googleapis.com`.
fn virtual_host_bucket(host: &str) -> Option<(&str, &str)> {
    if let Some(rest) = host.strip_suffix(".storage.googleapis.com") {
        return rest.rsplit_once('.').map_or(Some((rest, "storage.googleapis.com")), |_| {
            Some((rest, "storage.googleapis.com"))
        });
    }
    // `<bucket>.s3<anything>.amazonaws.com` - the middle segment covers
    // `s3`, `s3-us-west-2`, `s3.dualstack.us-west-2` etc.
    if let Some(dot) = host.find('.') {
        let (bucket, rest) = host.split_at(dot);
        let rest = &rest[1..];
        if rest.starts_with("s3") && rest.ends_with(".amazonaws.com") {
            return Some((bucket, rest));
        }
    }
    None
}

impl Url {
    /// Parse a filesystem path into a [`Url`].
    ///
    /// Relative paths are accepted; callers that need an absolute path
    /// (e.g. the filesystem backend root) should canonicalize separately.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::EmptyPath);
        }
        Ok(Self {
            scheme: Scheme::File,
            host: String::new(),
            path: path.to_string_lossy().into_owned(),
            separator: std::path::MAIN_SEPARATOR,
            virtual_host: false,
        })
    }

    /// Parse an `http://` or `https://` object-storage URL of the form
    /// `scheme://host[:port]/bucket[/key]`.
    ///
    /// Virtual-host-style hosts are normalized immediately: the bucket is
    /// extracted from the hostname prefix and folded into `path` as
    /// `/<bucket>/<key>`, so every downstream consumer sees the standard
    /// path-style shape regardless of how the URL was originally written.
    pub fn parse_http(raw: &str) -> Result<Self> {
        let (scheme_str, rest) =
            raw.split_once("://").ok_or_else(|| exn::Exn::new(ErrorKind::InvalidSource(raw.to_string())))?;
        let scheme = match scheme_str {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            _ => exn::bail!(ErrorKind::InvalidSource(raw.to_string())),
        };
        let (host, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        if host.is_empty() {
            exn::bail!(ErrorKind::EmptyPath);
        }
        let (host, path, virtual_host) = match virtual_host_bucket(host) {
            Some((bucket, canonical_host)) => (canonical_host.to_string(), format!("/{bucket}{path}"), true),
            None => (host.to_string(), if path.is_empty() { "/".to_string() } else { path.to_string() }, false),
        };
        Ok(Self { scheme, host, path, separator: '/', virtual_host })
    }

    /// Strip a trailing `...` recursion marker from a raw source address,
    /// returning the cleaned address and whether recursion was requested.
    ///
    /// Recursion is a property of the *address string*, stripped and
    /// recorded by the planner before the remainder is parsed as a [`Url`]
    /// — it is never part of the `Url` value itself (spec.md §3).
    pub fn strip_recursive_suffix(raw: &str) -> (&str, bool) {
        match raw.strip_suffix("...") {
            Some(stripped) => (stripped, true),
            None => (raw, false),
        }
    }

    /// The final path segment (basename), used when expanding shape B.
    pub fn basename(&self) -> &str {
        self.path.trim_end_matches(self.separator).rsplit(self.separator).next().unwrap_or("")
    }

    /// For object storage, decompose `path` into `(bucket, key)`.
    /// Returns `None` for filesystem URLs.
    pub fn bucket_and_key(&self) -> Option<(&str, &str)> {
        if !self.scheme.is_object_storage() {
            return None;
        }
        let trimmed = self.path.trim_start_matches('/');
        match trimmed.split_once('/') {
            Some((bucket, key)) => Some((bucket, key)),
            None => Some((trimmed, "")),
        }
    }

    /// True if this URL's path ends with a separator (denotes "this is a
    /// directory/prefix" in address form, independent of backend Stat).
    pub fn has_trailing_separator(&self) -> bool {
        self.path.ends_with(self.separator)
    }

    /// Join a relative segment onto this URL. Both URLs must share a
    /// scheme — joining across filesystem and object storage is never
    /// meaningful and is rejected (spec.md §3 invariant).
    pub fn join(&self, segment: &str) -> Result<Self> {
        let segment = segment.trim_start_matches(self.separator);
        let mut path = self.path.clone();
        if !path.ends_with(self.separator) {
            path.push(self.separator);
        }
        path.push_str(segment);
        match self.scheme {
            Scheme::File => {
                let joined = PathBuf::from(&path);
                Ok(Self { path: joined.to_string_lossy().into_owned(), ..self.clone() })
            },
            Scheme::Http | Scheme::Https => Ok(Self { path, ..self.clone() }),
        }
    }

    pub fn to_display_string(&self) -> String {
        match self.scheme {
            Scheme::File => self.path.clone(),
            Scheme::Http | Scheme::Https => format!("{}://{}{}", self.scheme, self.host, self.path),
        }
    }
}
impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parse_file_url() {
        let url = Url::parse_file("/tmp/a.bin").unwrap();
        assert_eq!(url.scheme, Scheme::File);
        assert_eq!(url.path, "/tmp/a.bin");
        assert_eq!(url.separator, std::path::MAIN_SEPARATOR);
    }

    #[test]
    fn parse_http_url_path_style() {
        let url = Url::parse_http("https://s3.amazonaws.com/bucket/key/obj.bin").unwrap();
        assert_eq!(url.host, "s3.amazonaws.com");
        assert_eq!(url.path, "/bucket/key/obj.bin");
        assert!(!url.virtual_host);
        assert_eq!(url.bucket_and_key(), Some(("bucket", "key/obj.bin")));
    }

    #[test]
    fn parse_http_url_virtual_host_style() {
        let url = Url::parse_http("https://my-bucket.s3.us-west-2.amazonaws.com/key/obj.bin").unwrap();
        assert!(url.virtual_host);
        assert_eq!(url.host, "s3.us-west-2.amazonaws.com");
        assert_eq!(url.bucket_and_key(), Some(("my-bucket", "key/obj.bin")));
    }

    #[test]
    fn parse_http_url_gcs_virtual_host() {
        let url = Url::parse_http("https://my-bucket.storage.googleapis.com/obj.bin").unwrap();
        assert!(url.virtual_host);
        assert_eq!(url.bucket_and_key(), Some(("my-bucket", "obj.bin")));
    }

    #[rstest]
    #[case("src/...", "src/", true)]
    #[case("src/", "src/", false)]
    #[case("...", "", true)]
    fn strip_recursive(#[case] raw: &str, #[case] expect: &str, #[case] recursive: bool) {
        assert_eq!(Url::strip_recursive_suffix(raw), (expect, recursive));
    }

    #[test]
    fn join_preserves_scheme_and_separator() {
        let base = Url::parse_http("https://s3.amazonaws.com/bucket/").unwrap();
        let joined = base.join("a/b.txt").unwrap();
        assert_eq!(joined.path, "/bucket/a/b.txt");
    }

    #[test]
    fn basename_of_file_url() {
        let url = Url::parse_file("/tmp/dir/file.txt").unwrap();
        assert_eq!(url.basename(), "file.txt");
    }
}
