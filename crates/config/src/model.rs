//! `config.json` shape: signature version, host lookup style, and the
//! alias book mapping short names to endpoints and credentials
//! (spec.md §6).

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignatureVersion {
    S3v2,
    S3v4,
}
impl Default for SignatureVersion {
    fn default() -> Self {
        Self::S3v4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupStyle {
    Dns,
    Path,
    Auto,
}
impl Default for LookupStyle {
    fn default() -> Self {
        Self::Auto
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HostConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    #[serde(default)]
    pub api_signature: SignatureVersion,
    #[serde(default)]
    pub lookup_style: LookupStyle,
    #[serde(default)]
    pub region: Option<String>,
}

/// `config.json`, loaded once at startup into an immutable snapshot
/// (spec.md §9 "Process-wide state").
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub aliases: BTreeMap<String, HostConfig>,
}

impl Config {
    pub fn host(&self, alias: &str) -> Option<&HostConfig> {
        self.aliases.get(alias)
    }
}
