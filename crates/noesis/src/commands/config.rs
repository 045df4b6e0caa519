//! Config command - configuration inspection and initialization.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use console::Style;
use noesis_config::NoesisConfig;

use super::{Context, heading};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,

    /// Write a config file with every section at its default
    Init {
        /// Create project-local config (./noesis.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file and database paths
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Init { local } => cmd_init(local, ctx),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = ctx.config();

    if ctx.json_output {
        return ctx.print_json(&serde_json::json!({
            "store": config.store_or_default(),
            "embedding": redacted_embedding(config),
            "generation": redacted_generation(config),
            "search": config.search_or_default(),
            "graph": config.graph_or_default(),
            "recommend": config.recommend_or_default(),
        }));
    }

    let dim = Style::new().dim();
    println!("# Noesis Configuration\n");

    let sources = ctx.loaded.loaded_from();
    if sources.is_empty() {
        println!("{}", dim.apply_to("No config files loaded (using defaults)\n"));
    } else {
        for source in sources {
            println!("{}", dim.apply_to(format!("# from {}", source.display())));
        }
        println!();
    }

    let embedding = config.embedding_or_default();
    let generation = config.generation_or_default();
    let search = config.search_or_default();
    let graph = config.graph_or_default();
    let recommend = config.recommend_or_default();

    println!("[store]");
    println!("database = {:?}", ctx.database.display().to_string());
    println!();
    println!("[embedding]");
    println!("provider = {:?}", embedding.provider.as_str());
    println!("dimensions = {}", embedding.effective_dimensions());
    println!("batch_size = {}", embedding.batch_size);
    println!("chunk_pause_ms = {}", embedding.chunk_pause_ms);
    println!(
        "api_key = {}",
        key_status(embedding.openai_or_default().resolve_api_key().is_some())
    );
    println!();
    println!("[generation]");
    println!("enabled = {}", generation.enabled);
    println!("model = {:?}", generation.model);
    println!("api_key = {}", key_status(generation.resolve_api_key().is_some()));
    println!();
    println!("[search]");
    println!("threshold = {}", search.threshold);
    println!("similar_threshold = {}", search.similar_threshold);
    println!("lexical_threshold = {}", search.lexical_threshold);
    println!("limit = {}", search.limit);
    println!();
    println!("[graph]");
    println!("inbound_weight = {}", graph.inbound_weight);
    println!("outbound_weight = {}", graph.outbound_weight);
    println!("neighborhood_depth = {}", graph.neighborhood_depth);
    println!("min_cluster_size = {}", graph.min_cluster_size);
    println!();
    println!("[recommend]");
    println!("similarity_threshold = {}", recommend.similarity_threshold);
    println!("max_suggestions = {}", recommend.max_suggestions);
    Ok(())
}

fn cmd_init(local: bool, ctx: &Context) -> Result<()> {
    let path = if local {
        PathBuf::from("noesis.toml")
    } else {
        user_config_path(ctx)
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    noesis_config::save_config(&default_config(), &path)?;
    println!("✓ Created config file: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  export OPENAI_API_KEY=...   # provider credentials");
    println!("  noesis config show          # verify configuration");
    Ok(())
}

/// Every section present, so the written file documents all settings.
fn default_config() -> NoesisConfig {
    NoesisConfig {
        store: Some(Default::default()),
        embedding: Some(Default::default()),
        generation: Some(Default::default()),
        search: Some(Default::default()),
        graph: Some(Default::default()),
        recommend: Some(Default::default()),
    }
}

fn user_config_path(ctx: &Context) -> Option<PathBuf> {
    match ctx.config_dir {
        Some(ref dir) => Some(dir.join("config.toml")),
        None => noesis_config::user_config_path(),
    }
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let user_config = user_config_path(ctx);

    if ctx.json_output {
        return ctx.print_json(&serde_json::json!({
            "config": user_config,
            "project_config": "noesis.toml",
            "database": ctx.database,
        }));
    }

    let dim = Style::new().dim();
    heading("Paths");
    match user_config {
        Some(path) => println!("{} {}", dim.apply_to("Config:  "), path.display()),
        None => println!("{} {}", dim.apply_to("Config:  "), "(no config directory)"),
    }
    println!("{} ./noesis.toml", dim.apply_to("Project: "));
    println!("{} {}", dim.apply_to("Database:"), ctx.database.display());
    Ok(())
}

fn key_status(present: bool) -> &'static str {
    if present { "\"(set)\"" } else { "\"(not set)\"" }
}

fn redacted_embedding(config: &NoesisConfig) -> noesis_config::EmbeddingConfig {
    let mut embedding = config.embedding_or_default();
    if let Some(ref mut openai) = embedding.openai {
        openai.api_key = openai.api_key.as_ref().map(|_| "(redacted)".to_string());
    }
    embedding
}

fn redacted_generation(config: &NoesisConfig) -> noesis_config::GenerationConfig {
    let mut generation = config.generation_or_default();
    generation.api_key = generation.api_key.as_ref().map(|_| "(redacted)".to_string());
    generation
}
