//! # Pinset CLI
//!
//! Operator tool for inspecting payloads and talking to providers directly.
//!
//! ## Commands
//!
//! - `root <file>`: compute the content root of a local file
//!   - `--chunk-size`: chunk size in bytes (default: 10240)
//! - `health <url>`: check a provider's `/version` against the expected network
//! - `fetch <url> <root>`: download a payload by content root from one provider
//!   - `--out`: write to a file instead of stdout
//! - `config`: print the effective replication settings as JSON
//!   - `--file`: TOML file to start from (env overrides still apply)
//!
//! ## Environment Variables
//!
//! - `PINSET_*`: replication settings, see `ReplicationConfig::from_env`
//! - `RUST_LOG`: log filter (default: info)

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pinset_common::config::load_from_file;
use pinset_common::{ChunkTreeBuilder, ContentRoot, ReplicationConfig, TreeBuilder};
use pinset_replicator::ProviderClient;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Default chunk size for `root` when the chain's value is unknown.
const DEFAULT_CHUNK_SIZE: u64 = 10_240;

#[derive(Parser)]
#[command(version, about = "Pinset operator CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the content root of a local file
    Root {
        file: PathBuf,
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: u64,
    },

    /// Check that a provider serves the expected network
    Health {
        url: String,
        #[arg(long, env = "PINSET_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Download a payload by content root from one provider
    Fetch {
        url: String,
        root: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(long, env = "PINSET_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Print the effective replication settings
    Config {
        #[arg(long, env = "PINSET_CONFIG")]
        file: Option<PathBuf>,
    },
}

fn settings(file: Option<&PathBuf>) -> Result<ReplicationConfig> {
    let mut cfg = match file {
        Some(path) => load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ReplicationConfig::default(),
    };
    cfg.apply_env(|key| std::env::var(key).ok())
        .context("applying PINSET_* environment overrides")?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Root { file, chunk_size } => {
            let mut reader = fs::File::open(&file)
                .with_context(|| format!("opening {}", file.display()))?;
            let summary = ChunkTreeBuilder.build_tree(&mut reader, chunk_size)?;
            println!("root:   {}", summary.root);
            println!("size:   {}", summary.size);
            println!("chunks: {}", summary.chunk_count);
        }

        Commands::Health { url, config } => {
            let cfg = settings(config.as_ref())?;
            let client = ProviderClient::new(&cfg)?;
            client.health_check(&url).await?;
            println!("OK: {} serves {}", url, client.network_id());
        }

        Commands::Fetch {
            url,
            root,
            out,
            config,
        } => {
            let cfg = settings(config.as_ref())?;
            let root: ContentRoot = root.parse().context("parsing content root")?;
            let client = ProviderClient::new(&cfg)?;
            let data = client.download(&url, &root).await?;
            info!(root = %root.short(), size = data.len(), "downloaded");
            match out {
                Some(path) => {
                    fs::write(&path, &data)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("wrote {} bytes to {}", data.len(), path.display());
                }
                None => std::io::stdout().write_all(&data)?,
            }
        }

        Commands::Config { file } => {
            let cfg = settings(file.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}
