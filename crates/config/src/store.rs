//! `config.json` loading, persistence, and the mutating `config host`
//! subcommands (spec.md §6).

use crate::error::{ErrorKind, Result};
use crate::model::{Config, HostConfig};
use figment::Figment;
use figment::providers::{Format, Json};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self { path: config_dir.as_ref().join("config.json") }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load `config.json` once at startup. Values are not re-read for
    /// the lifetime of the process (spec.md §9).
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Ok(Config::default());
        }
        Figment::new()
            .merge(Json::file(&self.path))
            .extract()
            .map_err(|e| exn::Exn::new(ErrorKind::Parse(e.to_string())))
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| exn::Exn::new(ErrorKind::Io(e.to_string())))?;
        }
        let bytes = serde_json::to_vec_pretty(config).map_err(|e| exn::Exn::new(ErrorKind::Parse(e.to_string())))?;
        std::fs::write(&self.path, bytes).map_err(|e| exn::Exn::new(ErrorKind::Io(e.to_string())))
    }

    pub fn host_add(&self, alias: impl Into<String>, host: HostConfig) -> Result<()> {
        let mut config = self.load()?;
        config.aliases.insert(alias.into(), host);
        self.save(&config)
    }

    pub fn host_remove(&self, alias: &str) -> Result<()> {
        let mut config = self.load()?;
        if config.aliases.remove(alias).is_none() {
            exn::bail!(ErrorKind::InvalidAlias(alias.to_string()));
        }
        self.save(&config)
    }

    pub fn host_list(&self) -> Result<Vec<(String, HostConfig)>> {
        let config = self.load()?;
        Ok(config.aliases.into_iter().collect())
    }
}

/// The per-user configuration directory: `~/.mc`-equivalent for this
/// client (spec.md §6 names `~/.mc`/`%USERPROFILE%\mc`; DESIGN.md records
/// the rename decision for a differently-named binary).
pub fn default_config_dir() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".haul"))
        .ok_or_else(|| exn::Exn::new(ErrorKind::NotConfigured("could not determine home directory".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_loads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        let config = store.load().unwrap();
        assert!(config.aliases.is_empty());
    }

    #[test]
    fn host_add_then_list_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        store
            .host_add(
                "play",
                HostConfig {
                    endpoint: "https://play.min.io".to_string(),
                    access_key: "k".to_string(),
                    secret_key: "s".to_string(),
                    api_signature: crate::model::SignatureVersion::S3v4,
                    lookup_style: crate::model::LookupStyle::Auto,
                    region: None,
                },
            )
            .unwrap();
        let hosts = store.host_list().unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].0, "play");
    }

    #[test]
    fn host_remove_unknown_alias_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(store.host_remove("nope").is_err());
    }
}
