//! Content-addressed URI resolver CLI
//!
//! Commands:
//! - hash: Compute IPFS hashes of local files
//! - resolve: Fetch and verify one URI
//! - batch: Resolve many URIs concurrently
//! - pin: Add files to IPFS through the default backend

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::io::Write;
use std::path::{Path, PathBuf};

use cas_resolver::backend::{http_client, ipfs_backend, write_new_file};
use cas_resolver::hash::{content_node, hash_content};
use cas_resolver::uri::create_ipfs_uri;
use cas_resolver::{BackendRegistry, Config};

#[derive(Parser)]
#[command(name = "cas-resolve")]
#[command(about = "Resolve content-addressed URIs with verification", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default IPFS backend (infura, gateway, fixture, local)
    #[arg(short, long)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the IPFS hash of files
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Also list the chunk links of multi-chunk files
        #[arg(short, long)]
        links: bool,
    },

    /// Resolve a URI to verified content
    Resolve {
        /// URI to resolve
        uri: String,

        /// Write content to this file instead of stdout (must not exist)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Race all capable backends instead of trying them in order
        #[arg(short, long)]
        race: bool,
    },

    /// Resolve many URIs concurrently
    Batch {
        /// URIs to resolve
        #[arg(required = true)]
        uris: Vec<String>,

        /// Directory to write content into, one file per IPFS hash
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Pin a file or directory through the default IPFS backend
    Pin {
        /// File or directory of assets
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_with_env(cli.config.as_deref())
        .context("Failed to load configuration")?;
    config
        .override_default_backend(cli.backend.as_deref())
        .context("Invalid --backend")?;

    let log_filter = Env::default().default_filter_or(config.resolver.log_level.as_str());
    env_logger::Builder::from_env(log_filter).init();

    match &cli.command {
        Commands::Hash { files, links } => cmd_hash(files, *links),
        Commands::Resolve { uri, output, race } => {
            cmd_resolve(&config, uri, output.as_deref(), *race).await
        }
        Commands::Batch { uris, output_dir } => {
            cmd_batch(&config, uris, output_dir.as_deref()).await
        }
        Commands::Pin { path } => cmd_pin(&config, path).await,
    }
}

fn cmd_hash(files: &[PathBuf], links: bool) -> Result<()> {
    for file in files {
        let content = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
        let node = content_node(&content);

        println!("{}  {}", create_ipfs_uri(&node.hash().to_base58()), file.display());

        if links {
            for link in node.links() {
                println!("  {} {:>10} bytes", link.hash, link.size);
            }
        }
    }
    Ok(())
}

async fn cmd_resolve(config: &Config, uri: &str, output: Option<&Path>, race: bool) -> Result<()> {
    let registry = BackendRegistry::from_config(config)?;

    if let Some(output) = output {
        if race {
            let content = registry.resolve_racing(uri).await?;
            write_new_file(output, &content)?;
        } else {
            registry.write_to_disk(uri, output).await?;
        }
        println!("✓ Wrote {} to {}", uri, output.display());
        return Ok(());
    }

    let content = if race {
        registry.resolve_racing(uri).await?
    } else {
        registry.resolve(uri).await?
    };
    std::io::stdout()
        .write_all(&content)
        .context("Failed to write content to stdout")?;
    Ok(())
}

async fn cmd_batch(config: &Config, uris: &[String], output_dir: Option<&Path>) -> Result<()> {
    let registry = BackendRegistry::from_config(config)?;
    let resolved = registry.resolve_batch(uris.iter().cloned()).await?;

    let mut names: Vec<&String> = resolved.keys().collect();
    names.sort();

    for uri in names {
        let content = &resolved[uri];
        let hash = hash_content(content).to_base58();
        println!("{}  {} bytes  {}", uri, content.len(), hash);

        if let Some(dir) = output_dir {
            let target = dir.join(&hash);
            if target.exists() {
                log::info!("{:?} already present, skipping", target);
                continue;
            }
            write_new_file(&target, content)
                .with_context(|| format!("Failed to write {:?}", target))?;
        }
    }
    Ok(())
}

async fn cmd_pin(config: &Config, path: &Path) -> Result<()> {
    let kind = config.default_backend()?;
    let backend = ipfs_backend(kind, config, http_client(config)?)?;

    println!("Pinning {} via {}", path.display(), backend.name());

    let pinned = backend.pin_assets(path).await?;
    println!("{}", serde_json::to_string_pretty(&pinned)?);
    Ok(())
}
