//! entra-token - acquire a Microsoft Entra ID access token.
//!
//! Tries silent acquisition against the cached account first and falls
//! back to an interactive browser login. The token cache is persisted
//! encrypted at the caller-supplied path. The access token is printed
//! to stdout; all diagnostics go to stderr.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use secrecy::{ExposeSecret, SecretString};

use entra_login::{
    AccountSelection, CacheStore, ClientConfig, PublicClient, SealerKind, acquire_token,
};

/// Acquire an Entra ID access token, silently when a cached account
/// allows it, interactively otherwise.
#[derive(Debug, Parser)]
#[command(name = "entra-token", version, about)]
struct Cli {
    /// Directory tenant: a GUID, a domain name, or "common"
    tenant_id: String,

    /// Application (client) ID of the public-client registration
    client_id: String,

    /// Comma-separated scopes to request, e.g. "User.Read,Mail.Read"
    scopes: String,

    /// Path of the encrypted token cache file
    token_cache_path: PathBuf,
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    // stdout is reserved for the token; everything else goes to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<SecretString> {
    let scopes: Vec<String> = cli
        .scopes
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let sealer = SealerKind::from_env()?.build();
    let store = CacheStore::new(&cli.token_cache_path, sealer);

    let config = ClientConfig::new(cli.tenant_id, cli.client_id)?;
    let client = PublicClient::new(config)?;

    let token = acquire_token(&client, &store, AccountSelection::First, &scopes).await?;
    Ok(token)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(token) => println!("{}", token.expose_secret()),
        Err(e) => {
            tracing::error!("No token produced: {e:#}");
            std::process::exit(1);
        }
    }
}
