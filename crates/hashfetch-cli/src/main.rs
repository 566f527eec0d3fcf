use anyhow::Context;
use clap::Parser;
use hashfetch::{ContentHash, HashFetch, ReqwestClient};
use tracing_subscriber::EnvFilter;

mod app;
mod config;

use app::{App, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = App::parse();
    init_tracing(app.verbose);

    let options = config::load_options(&app)?;
    let registry = config::load_registry(&app)?;
    let engine = HashFetch::local(options, registry, ReqwestClient::new());

    match app.cmd {
        Commands::Fetch(arg) => {
            let hash = parse_hash(&arg.hash)?;
            let result = engine.fetch(&hash, arg.kind).await;
            // Let a freshly recorded failure reach disk before exiting.
            engine.ledger().flush().await;
            let path = result?;
            println!("{}", path.display());
        }
        Commands::Resolve(arg) => {
            let hash = parse_hash(&arg.hash)?;
            let locator = engine.resolve(&hash).await?;
            let kind = if locator.is_archive { "archive" } else { "file" };
            println!("{kind}\t{}", locator.url);
        }
        Commands::History => {
            engine.initialize().await?;
            let entries = engine.ledger().entries();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }
    Ok(())
}

fn parse_hash(input: &str) -> anyhow::Result<ContentHash> {
    ContentHash::parse(input).with_context(|| format!("'{input}' is not a 32-byte hex hash"))
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
