//! Search and similar commands.

use anyhow::Result;
use clap::Args;
use console::Style;
use noesis_graph::{RankedResult, SearchOptions, SimilarOptions, SimilarityMethod};
use noesis_types::{NodeId, NodeType};
use serde::Serialize;

use super::{Context, heading, truncate};

/// Arguments for the search command.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Maximum results
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Minimum similarity (0 disables filtering)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Only nodes of these types
    #[arg(short = 't', long = "type")]
    pub node_types: Vec<String>,

    /// Only nodes carrying all of these tags
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Fall back to keyword matching if the embedding provider is unavailable
    #[arg(long)]
    pub lexical_fallback: bool,
}

/// Arguments for the similar command.
#[derive(Args, Debug)]
pub struct SimilarArgs {
    /// Node ID
    pub id: String,

    /// Maximum results
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Minimum similarity (0 disables filtering)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Include the node itself
    #[arg(long)]
    pub include_self: bool,
}

#[derive(Serialize)]
struct ResultView<'a> {
    id: &'a NodeId,
    title: &'a str,
    similarity: f64,
    method: SimilarityMethod,
}

/// Run the search command.
pub async fn run_search(args: SearchArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;

    let mut options = SearchOptions::new()
        .with_tags(args.tags)
        .with_types(
            args.node_types
                .iter()
                .map(|t| t.parse::<NodeType>())
                .collect::<Result<Vec<_>, _>>()?,
        );
    if let Some(limit) = args.limit {
        options = options.with_limit(limit);
    }
    if let Some(threshold) = args.threshold {
        options = options.with_threshold(threshold);
    }
    if args.lexical_fallback {
        options = options.with_lexical_fallback();
    }

    let results = engine.semantic_search(&args.query, &options).await?;
    print_results(ctx, &format!("Search: \"{}\"", args.query), &results)
}

/// Run the similar command.
pub async fn run_similar(args: SimilarArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let id = NodeId::from(args.id);

    let mut options = SimilarOptions::new().with_limit(args.limit);
    if let Some(threshold) = args.threshold {
        options = options.with_threshold(threshold);
    }
    if args.include_self {
        options = options.including_self();
    }

    let node = engine.get_node(&id)?;
    let results = engine.find_similar(&id, &options)?;
    print_results(ctx, &format!("Similar to \"{}\"", node.title), &results)
}

fn print_results(ctx: &Context, title: &str, results: &[RankedResult]) -> Result<()> {
    if ctx.json_output {
        let views: Vec<_> = results
            .iter()
            .map(|r| ResultView {
                id: &r.node.id,
                title: &r.node.title,
                similarity: r.similarity,
                method: r.method,
            })
            .collect();
        return ctx.print_json(&views);
    }

    let dim = Style::new().dim();
    let cyan = Style::new().cyan();
    heading(title);
    println!();

    if results.is_empty() {
        println!("{}", dim.apply_to("No related knowledge found"));
        return Ok(());
    }

    for result in results {
        let score = match result.method {
            SimilarityMethod::Embedding => format!("{:>4.0}%", result.similarity * 100.0),
            SimilarityMethod::Lexical => format!("{:>4.0}%~", result.similarity * 100.0),
        };
        println!(
            "{} {} {}",
            cyan.apply_to(score),
            truncate(&result.node.title, 60),
            dim.apply_to(format!("[{}]", result.node.id))
        );
    }
    if results
        .iter()
        .any(|r| r.method == SimilarityMethod::Lexical)
    {
        println!();
        println!(
            "{}",
            dim.apply_to("~ keyword overlap, no embedding available")
        );
    }
    Ok(())
}
