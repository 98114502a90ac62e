//! Process-wide resources assembled once in `main` and threaded through
//! every command (spec.md §9 "Process-wide state"): the immutable config
//! snapshot, the object-storage client cache, and the session/share
//! stores rooted under the per-user configuration directory.

use haul_config::{ClientCache, Config, ConfigStore};
use haul_session::SessionStore;
use haul_share::ShareStore;
use std::path::PathBuf;
use std::sync::Arc;

pub struct Context {
    pub config: Arc<Config>,
    pub config_store: ConfigStore,
    pub clients: ClientCache,
    pub sessions: SessionStore,
    pub shares: ShareStore,
    pub config_dir: PathBuf,
}

impl Context {
    pub fn new(config_dir: PathBuf) -> crate::error::Result<Self> {
        let config_store = ConfigStore::new(&config_dir);
        let config = Arc::new(config_store.load()?);
        let sessions = SessionStore::new(haul_session::session_dir(&config_dir));
        let shares = ShareStore::new(config_dir.join("share"));
        Ok(Self { config, config_store, clients: ClientCache::new(), sessions, shares, config_dir })
    }
}
