//! CLI surface (spec.md §6): one `clap` command per core entry point.
//! Flag parsing and help text live here; everything a flag drives lives
//! in `haul-*`. This module only ever builds arguments and hands them to
//! `commands::*`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "haul", version, about = "Move, mirror, and sync data between a filesystem and S3-compatible object stores")]
pub struct Cli {
    /// Suppress the progress bar and status lines; print only a final summary.
    #[arg(long, global = true)]
    pub quiet: bool,
    /// Emit machine-readable JSON status instead of the animated progress bar.
    #[arg(long, global = true)]
    pub json: bool,
    /// Raise the log filter to `debug`.
    #[arg(long, global = true)]
    pub debug: bool,
    /// Override the per-user configuration directory (default: `~/.haul`).
    #[arg(long, global = true)]
    pub config_folder: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List objects under a URL.
    Ls {
        url: Option<String>,
        #[arg(short, long)]
        recursive: bool,
        #[arg(long)]
        incomplete: bool,
    },
    /// Idempotently create a bucket.
    Mb {
        url: String,
        #[arg(long)]
        region: Option<String>,
    },
    /// Remove an empty bucket.
    Rb {
        url: String,
        #[arg(long)]
        force: bool,
    },
    /// Copy one or more sources to a target (spec.md §4.1 shapes A-D).
    Cp {
        /// Copy source directories recursively (equivalent to suffixing the
        /// last source with `...`).
        #[arg(short, long)]
        recursive: bool,
        /// One or more sources followed by the target; the final argument
        /// is always the target.
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,
    },
    /// Make `target` match `source` by copying differences (spec.md §4.5).
    Mirror {
        /// Also overwrite objects whose size differs, not just objects
        /// missing from the target.
        #[arg(long)]
        force: bool,
        source: String,
        target: String,
    },
    /// Show the difference between two directories/prefixes (spec.md §4.4).
    Diff { first: String, second: String },
    /// Remove objects or incomplete partial uploads.
    Rm {
        #[arg(short, long)]
        recursive: bool,
        #[arg(long)]
        incomplete: bool,
        /// Don't fail if the object doesn't exist.
        #[arg(long)]
        force: bool,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Stream an object to stdout.
    Cat { url: String },
    /// Stream stdin to an object.
    Pipe { url: String },
    /// Presigned-URL lifecycle (spec.md §4.7).
    Share {
        #[command(subcommand)]
        action: ShareAction,
    },
    /// Durable-session lifecycle (spec.md §4.6).
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Coarse bucket/directory access policy (spec.md §4.2).
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
    /// Host alias and credential book (spec.md §6).
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ShareAction {
    /// Generate a presigned download URL.
    Download {
        url: String,
        /// `<N>{s|m|h}`; default 168h, bounds [1s, 168h] (spec.md §6).
        #[arg(default_value = "168h")]
        duration: String,
    },
    /// Generate a presigned upload form.
    Upload {
        url: String,
        #[arg(default_value = "168h")]
        duration: String,
        #[arg(short, long)]
        recursive: bool,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// List unexpired shared URLs.
    List {
        /// Restrict the listing to one kind.
        #[arg(long, value_enum)]
        kind: Option<ShareKindArg>,
    },
    /// Drop every shared URL.
    Clear,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum ShareKindArg {
    Download,
    Upload,
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// List resumable sessions.
    List,
    /// Resume a previously-interrupted transfer.
    Resume { id: String },
    /// Purge one session, or every resumable session with `all`.
    Clear { id: String },
}

#[derive(Subcommand, Debug)]
pub enum PolicyAction {
    Get { url: String },
    Set { policy: PolicyArg, url: String },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum PolicyArg {
    None,
    Readonly,
    Writeonly,
    Readwrite,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    Host {
        #[command(subcommand)]
        action: ConfigHostAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigHostAction {
    Add {
        alias: String,
        endpoint: String,
        access_key: String,
        secret_key: String,
        #[arg(long, value_enum, default_value = "s3v4")]
        api: ApiSignatureArg,
        #[arg(long, value_enum, default_value = "auto")]
        lookup: LookupStyleArg,
        #[arg(long)]
        region: Option<String>,
    },
    Remove {
        alias: String,
    },
    List,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
#[value(rename_all = "lower")]
pub enum ApiSignatureArg {
    S3v2,
    S3v4,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum LookupStyleArg {
    Dns,
    Path,
    Auto,
}
