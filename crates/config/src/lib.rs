//! Host alias book and credential configuration (spec.md §6): `config.json`
//! loading/persistence, alias resolution, and cached backend construction.
//!
//! Loaded once at startup into an immutable snapshot and referenced
//! read-only thereafter (spec.md §9 "Process-wide state").

pub mod error;
pub mod factory;
pub mod model;
pub mod resolve;
pub mod store;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::factory::ClientCache;
pub use crate::model::{Config, HostConfig, LookupStyle, SignatureVersion};
pub use crate::resolve::{Resolved, resolve};
pub use crate::store::{ConfigStore, default_config_dir};
