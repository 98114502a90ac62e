//! `haul`: move, mirror, and sync data between a filesystem and
//! S3-compatible object stores (spec.md §1).
//!
//! `main` owns process-wide setup — logging, CLI parsing, the
//! process-wide [`Context`] — and dispatches into `commands::*`, which
//! do the actual work against the `haul-*` core crates.

mod backend;
mod cli;
mod commands;
mod context;
mod error;
mod output;

use clap::Parser;
use cli::{Cli, Command, ConfigAction, ConfigHostAction, PolicyAction, SessionAction, ShareAction};
use context::Context;
use error::AppError;
use output::OutputMode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let mode = OutputMode::from_flags(cli.quiet, cli.json);
    let config_dir = match cli.config_folder.clone() {
        Some(dir) => dir,
        None => match haul_config::default_config_dir() {
            Ok(dir) => dir,
            Err(err) => {
                output::print_error(mode, &AppError::from(err));
                std::process::exit(1);
            },
        },
    };

    let ctx = match Context::new(config_dir) {
        Ok(ctx) => ctx,
        Err(err) => {
            output::print_error(mode, &err);
            std::process::exit(1);
        },
    };

    let outcome = dispatch(&ctx, mode, cli.command).await;
    match outcome {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            output::print_error(mode, &err);
            std::process::exit(1);
        },
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(ctx: &Context, mode: OutputMode, command: Command) -> error::Result<i32> {
    match command {
        Command::Ls { url, recursive, incomplete } => commands::ls::run(ctx, mode, url, recursive, incomplete).await,
        Command::Mb { url, region } => commands::bucket::make(ctx, mode, url, region).await,
        Command::Rb { url, force } => commands::bucket::remove(ctx, mode, url, force).await,
        Command::Cp { recursive, paths } => commands::cp::run(ctx, mode, recursive, paths).await,
        Command::Mirror { force, source, target } => commands::mirror::run(ctx, mode, force, source, target).await,
        Command::Diff { first, second } => commands::diff::run(ctx, mode, first, second).await,
        Command::Rm { recursive, incomplete, force, urls } => commands::rm::run(ctx, mode, recursive, incomplete, force, urls).await,
        Command::Cat { url } => commands::stream::cat(ctx, url).await,
        Command::Pipe { url } => commands::stream::pipe(ctx, url).await,
        Command::Share { action } => match action {
            ShareAction::Download { url, duration } => commands::share::download(ctx, mode, url, duration).await,
            ShareAction::Upload { url, duration, recursive, content_type } => {
                commands::share::upload(ctx, mode, url, duration, recursive, content_type).await
            },
            ShareAction::List { kind } => commands::share::list(ctx, mode, kind).await,
            ShareAction::Clear => commands::share::clear(ctx).await,
        },
        Command::Session { action } => match action {
            SessionAction::List => commands::session::list(ctx, mode).await,
            SessionAction::Resume { id } => commands::session::resume(ctx, mode, id).await,
            SessionAction::Clear { id } => commands::session::clear(ctx, mode, id).await,
        },
        Command::Policy { action } => match action {
            PolicyAction::Get { url } => commands::policy::get(ctx, mode, url).await,
            PolicyAction::Set { policy, url } => commands::policy::set(ctx, mode, policy, url).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Host { action } => match action {
                ConfigHostAction::Add { alias, endpoint, access_key, secret_key, api, lookup, region } => {
                    commands::config::host_add(ctx, mode, alias, endpoint, access_key, secret_key, api, lookup, region).await
                },
                ConfigHostAction::Remove { alias } => commands::config::host_remove(ctx, mode, alias).await,
                ConfigHostAction::List => commands::config::host_list(ctx, mode).await,
            },
        },
    }
}
