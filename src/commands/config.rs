//! `config host` (spec.md §6): the host alias/credential book. A plain
//! passthrough to [`haul_config::ConfigStore`] — `main` loads the config
//! once at startup (spec.md §9), so these mutate `config.json` directly
//! rather than through the process-wide immutable snapshot.

use crate::cli::{ApiSignatureArg, LookupStyleArg};
use crate::context::Context;
use crate::error::Result;
use crate::output::OutputMode;
use haul_config::{HostConfig, LookupStyle, SignatureVersion};

fn signature_of(arg: ApiSignatureArg) -> SignatureVersion {
    match arg {
        ApiSignatureArg::S3v2 => SignatureVersion::S3v2,
        ApiSignatureArg::S3v4 => SignatureVersion::S3v4,
    }
}

fn lookup_of(arg: LookupStyleArg) -> LookupStyle {
    match arg {
        LookupStyleArg::Dns => LookupStyle::Dns,
        LookupStyleArg::Path => LookupStyle::Path,
        LookupStyleArg::Auto => LookupStyle::Auto,
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn host_add(
    ctx: &Context,
    mode: OutputMode,
    alias: String,
    endpoint: String,
    access_key: String,
    secret_key: String,
    api: ApiSignatureArg,
    lookup: LookupStyleArg,
    region: Option<String>,
) -> Result<i32> {
    let host = HostConfig {
        endpoint,
        access_key,
        secret_key,
        api_signature: signature_of(api),
        lookup_style: lookup_of(lookup),
        region,
    };
    ctx.config_store.host_add(&alias, host)?;
    match mode {
        OutputMode::Json => println!("{}", serde_json::json!({"status": "success", "alias": alias})),
        _ => println!("host added: {alias}"),
    }
    Ok(0)
}

pub async fn host_remove(ctx: &Context, mode: OutputMode, alias: String) -> Result<i32> {
    ctx.config_store.host_remove(&alias)?;
    match mode {
        OutputMode::Json => println!("{}", serde_json::json!({"status": "success", "alias": alias})),
        _ => println!("host removed: {alias}"),
    }
    Ok(0)
}

pub async fn host_list(ctx: &Context, mode: OutputMode) -> Result<i32> {
    let hosts = ctx.config_store.host_list()?;
    for (alias, host) in &hosts {
        match mode {
            OutputMode::Json => println!(
                "{}",
                serde_json::json!({"alias": alias, "endpoint": host.endpoint, "access_key": host.access_key})
            ),
            _ => println!("{alias:<16} {}", host.endpoint),
        }
    }
    Ok(0)
}
