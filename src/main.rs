use candidate_miner::{
    ChannelDiscoveryAgent, HttpReasoningService, SearchAgentConfig, SubprocessSearchBackend,
};
use candidate_miner::types::DiscoveryConstraints;
use clap::{Parser, Subcommand};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "candidate-miner", about = "Candidate discovery and scoring pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover verified mineable channels for a query
    Discover {
        /// The (refined) recruiting query
        query: String,
        /// Context about the hiring company
        #[arg(long)]
        company_context: Option<String>,
        /// Hard constraint, repeatable
        #[arg(long = "constraint")]
        constraints: Vec<String>,
        /// Search agent timeout in seconds
        #[arg(long, default_value_t = 600)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Discover {
            query,
            company_context,
            constraints,
            timeout,
        } => {
            let agent_path = env::var("MINER_SEARCH_AGENT")
                .unwrap_or_else(|_| "channel-search-agent".to_string());

            let reasoning = Arc::new(HttpReasoningService::from_env()?);
            let backend = Arc::new(SubprocessSearchBackend::new(
                SearchAgentConfig::new(agent_path)
                    .with_timeout(Duration::from_secs(timeout)),
            ));
            let discovery = ChannelDiscoveryAgent::new(reasoning, backend);

            info!("Discovering channels for query: {}", query);
            let channels = discovery
                .propose_channels(
                    &query,
                    &DiscoveryConstraints {
                        company_context,
                        constraints,
                    },
                )
                .await?;

            println!("{}", serde_json::to_string_pretty(&channels)?);
        }
    }

    Ok(())
}
