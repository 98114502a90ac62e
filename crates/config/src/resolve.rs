//! Alias resolution: turning a CLI address like `myalias/bucket/key` into
//! a concrete [`Url`] plus the [`HostConfig`] credentials it should be
//! reached with. Uniform addressing is spec.md §1's job, not the CLI
//! parser's, so this lives in core config rather than command glue.

use crate::error::{ErrorKind, Result};
use crate::model::{Config, HostConfig};
use haul_url::Url;

/// The resolved target: either the local filesystem, or an alias-backed
/// object-storage endpoint with its credentials.
pub enum Resolved {
    File(Url),
    ObjectStorage { url: Url, host: HostConfig },
}

/// Resolve one raw CLI address. An address whose first path segment
/// names a configured alias is object storage; `http(s)://` addresses
/// are taken as already-resolved (credentials must still come from a
/// matching alias by endpoint, looked up separately); everything else is
/// a filesystem path.
pub fn resolve(config: &Config, raw: &str) -> Result<Resolved> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        let url = Url::parse_http(raw).map_err(|e| exn::Exn::new(ErrorKind::InvalidArgument(e.to_string())))?;
        return Ok(Resolved::File(url));
    }
    let (head, rest) = match raw.split_once('/') {
        Some((head, rest)) => (head, rest),
        None => (raw, ""),
    };
    match config.host(head) {
        Some(host) => {
            let endpoint = host.endpoint.trim_end_matches('/');
            let full = if rest.is_empty() { endpoint.to_string() } else { format!("{endpoint}/{rest}") };
            let url =
                Url::parse_http(&full).map_err(|e| exn::Exn::new(ErrorKind::InvalidArgument(e.to_string())))?;
            Ok(Resolved::ObjectStorage { url, host: host.clone() })
        },
        None => {
            let url = Url::parse_file(raw).map_err(|e| exn::Exn::new(ErrorKind::InvalidArgument(e.to_string())))?;
            Ok(Resolved::File(url))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LookupStyle, SignatureVersion};

    fn config_with_alias() -> Config {
        let mut config = Config::default();
        config.aliases.insert(
            "play".to_string(),
            HostConfig {
                endpoint: "https://play.min.io".to_string(),
                access_key: "key".to_string(),
                secret_key: "secret".to_string(),
                api_signature: SignatureVersion::S3v4,
                lookup_style: LookupStyle::Path,
                region: None,
            },
        );
        config
    }

    #[test]
    fn resolves_known_alias_to_object_storage() {
        let config = config_with_alias();
        let resolved = resolve(&config, "play/bucket/key.txt").unwrap();
        match resolved {
            Resolved::ObjectStorage { url, .. } => assert_eq!(url.path, "/bucket/key.txt"),
            Resolved::File(_) => panic!("expected object storage"),
        }
    }

    #[test]
    fn unrecognized_prefix_is_a_filesystem_path() {
        let config = config_with_alias();
        let resolved = resolve(&config, "/tmp/a.bin").unwrap();
        assert!(matches!(resolved, Resolved::File(_)));
    }
}
