use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use hashfetch::ExpectedKind;

#[derive(Clone, Debug, Parser)]
#[command(name = "hashfetch", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Registry document: `{ "<hash>": { "slug", "commit", "author" } }`.
    #[arg(long, short, global = true, env = "HASHFETCH_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// TOML file with engine options.
    #[arg(long, short, global = true, env = "HASHFETCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Store root; overrides the configuration file.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// More output (-v debug, -vv trace).
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Fetch a hash into the store and print its path.
    #[command(alias = "f", name = "fetch")]
    Fetch(FetchArg),
    /// Show where a hash would be downloaded from.
    #[command(alias = "r", name = "resolve")]
    Resolve(HashArg),
    /// Print the retry ledger.
    #[command(alias = "h", name = "history")]
    History,
}

#[derive(Clone, Debug, clap::Args)]
pub struct FetchArg {
    pub hash: String,

    #[arg(long, short, default_value = "file", value_parser = parse_kind)]
    pub kind: ExpectedKind,
}

#[derive(Clone, Debug, clap::Args)]
pub struct HashArg {
    pub hash: String,
}

fn parse_kind(s: &str) -> Result<ExpectedKind, String> { s.parse() }
