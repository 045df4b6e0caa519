//! Noesis - semantic knowledge graph on the command line
//!
//! Main entry point for the noesis CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, embed, graph, link, node, recommend, search};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Noesis - semantic knowledge graph on the command line
#[derive(Parser)]
#[command(name = "noesis")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Database file (default: noesis.db in the data directory)
    #[arg(long, global = true, env = "NOESIS_DATABASE")]
    pub database: Option<PathBuf>,

    /// Config directory (default: platform config dir)
    #[arg(long, global = true, env = "NOESIS_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Knowledge node management
    Node(node::NodeArgs),

    /// Generate embeddings for nodes that lack them
    Embed(embed::EmbedArgs),

    /// Semantic search across all nodes
    Search(search::SearchArgs),

    /// Find nodes similar to a given node
    Similar(search::SimilarArgs),

    /// Create a relationship between two nodes
    Link(link::LinkArgs),

    /// Show backlinks and outlinks of a node
    Links(link::LinksArgs),

    /// Show influence of a node, or the most influential nodes
    Influence(graph::InfluenceArgs),

    /// Show nodes within a number of hops of a node
    Neighborhood(graph::NeighborhoodArgs),

    /// Show clusters of connected nodes
    Clusters(graph::ClustersArgs),

    /// Show nodes that hold clusters together
    Bridges,

    /// Suggest relationships for a node
    Recommend(recommend::RecommendArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable, stderr) + rotating JSON file
    let filter = if cli.verbose {
        "noesis=debug,noesis_graph=debug,noesis_llm=debug,noesis_store=debug,noesis_config=debug,info"
    } else {
        "noesis=warn,noesis_graph=warn,noesis_llm=warn,noesis_store=warn,warn"
    };

    let log_dir = cli
        .config_dir
        .clone()
        .or_else(noesis_config::config_dir)
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "noesis.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "noesis=trace,noesis_graph=trace,noesis_llm=trace,noesis_store=trace,noesis_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context::load(cli.json, cli.verbose, cli.database, cli.config_dir)?;

    match cli.command {
        Commands::Node(args) => node::run(args, &ctx).await,
        Commands::Embed(args) => embed::run(args, &ctx).await,
        Commands::Search(args) => search::run_search(args, &ctx).await,
        Commands::Similar(args) => search::run_similar(args, &ctx).await,
        Commands::Link(args) => link::run_link(args, &ctx).await,
        Commands::Links(args) => link::run_links(args, &ctx).await,
        Commands::Influence(args) => graph::run_influence(args, &ctx).await,
        Commands::Neighborhood(args) => graph::run_neighborhood(args, &ctx).await,
        Commands::Clusters(args) => graph::run_clusters(args, &ctx).await,
        Commands::Bridges => graph::run_bridges(&ctx).await,
        Commands::Recommend(args) => recommend::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
