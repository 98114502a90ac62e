//! Turns one raw CLI address into a constructed backend: strip the `...`
//! recursion suffix (spec.md §3), resolve the alias/credentials
//! (`haul-config`), then build (or reuse, from the process-wide cache)
//! the backend bound to that root.

use crate::context::Context;
use crate::error::Result;
use haul_storage::BackendHandle;
use haul_url::Url;

pub struct Resolved {
    pub backend: BackendHandle,
    pub recursive: bool,
}

pub async fn resolve(ctx: &Context, raw: &str) -> Result<Resolved> {
    let (stripped, recursive) = Url::strip_recursive_suffix(raw);
    let resolved = haul_config::resolve(&ctx.config, stripped)?;
    let backend = ctx.clients.backend(&resolved).await?;
    Ok(Resolved { backend, recursive })
}

/// Build a [`haul_transfer::BackendResolver`] that picks, for a given
/// source URL encountered during phase 2 (spec.md §4.3), whichever of
/// the already-resolved source backends owns it — matched by scheme,
/// host, and root-path prefix. Covers shape D, where each source may
/// come from a different alias.
pub fn resolver_for(sources: Vec<BackendHandle>) -> haul_transfer::BackendResolver {
    std::sync::Arc::new(move |url: &Url| {
        sources
            .iter()
            .filter(|backend| {
                let root = backend.root_url();
                root.scheme == url.scheme && root.host == url.host && url.path.starts_with(&root.path)
            })
            .max_by_key(|backend| backend.root_url().path.len())
            .cloned()
    })
}
