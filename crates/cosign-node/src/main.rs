//! Command-line entry point for a cosign node

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "cosign")]
#[command(about = "Registry co-signing and result aggregation node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path; built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Offer queries to registries and collect their co-signatures
    QueryServer {
        /// Override `[distribution] bind`
        #[arg(long)]
        bind: Option<String>,
    },

    /// Tally encrypted results and forward summaries
    SummaryServer {
        /// Override `[aggregation] bind`
        #[arg(long)]
        bind: Option<String>,
    },

    /// Generate signing and encryption keys
    Keygen {
        /// Signer id the keys belong to
        #[arg(long)]
        signer: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // --verbose wins over RUST_LOG
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::QueryServer { bind } => {
            let mut config = cosign_node::load_config(cli.config.as_deref())?;
            if let Some(bind) = bind {
                config.distribution.bind = bind;
            }
            commands::serve::query_server(&config).await?;
        }

        Commands::SummaryServer { bind } => {
            let mut config = cosign_node::load_config(cli.config.as_deref())?;
            if let Some(bind) = bind {
                config.aggregation.bind = bind;
            }
            commands::serve::summary_server(&config).await?;
        }

        Commands::Keygen { signer } => {
            commands::keygen::run(&signer)?;
        }
    }

    Ok(())
}
