//! `policy` (spec.md §4.2 `GetAccess`/`SetAccess`).

use crate::backend;
use crate::cli::PolicyArg;
use crate::context::Context;
use crate::error::Result;
use crate::output::OutputMode;
use haul_storage::AccessPolicy;

fn policy_name(policy: AccessPolicy) -> &'static str {
    match policy {
        AccessPolicy::None => "none",
        AccessPolicy::ReadOnly => "readonly",
        AccessPolicy::WriteOnly => "writeonly",
        AccessPolicy::ReadWrite => "readwrite",
    }
}

fn from_arg(arg: PolicyArg) -> AccessPolicy {
    match arg {
        PolicyArg::None => AccessPolicy::None,
        PolicyArg::Readonly => AccessPolicy::ReadOnly,
        PolicyArg::Writeonly => AccessPolicy::WriteOnly,
        PolicyArg::Readwrite => AccessPolicy::ReadWrite,
    }
}

pub async fn get(ctx: &Context, mode: OutputMode, url: String) -> Result<i32> {
    let resolved = backend::resolve(ctx, &url).await?;
    let policy = resolved.backend.get_access().await?;
    match mode {
        OutputMode::Json => println!("{}", serde_json::json!({"url": url, "policy": policy_name(policy)})),
        _ => println!("{}", policy_name(policy)),
    }
    Ok(0)
}

pub async fn set(ctx: &Context, mode: OutputMode, policy: PolicyArg, url: String) -> Result<i32> {
    let resolved = backend::resolve(ctx, &url).await?;
    resolved.backend.set_access(from_arg(policy)).await?;
    match mode {
        OutputMode::Json => println!("{}", serde_json::json!({"status": "success", "url": url, "policy": policy_name(from_arg(policy))})),
        _ => println!("policy set: {url} -> {}", policy_name(from_arg(policy))),
    }
    Ok(0)
}
