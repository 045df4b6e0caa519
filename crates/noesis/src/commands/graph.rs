//! Graph analysis commands.

use anyhow::Result;
use clap::Args;
use console::Style;
use noesis_graph::Influence;
use noesis_types::NodeId;

use super::{Context, heading, truncate};

/// Arguments for the influence command.
#[derive(Args, Debug)]
pub struct InfluenceArgs {
    /// Node ID (omit to rank all nodes)
    pub id: Option<String>,

    /// Nodes to show when ranking
    #[arg(short, long, default_value = "10")]
    pub limit: usize,
}

/// Arguments for the neighborhood command.
#[derive(Args, Debug)]
pub struct NeighborhoodArgs {
    /// Node ID
    pub id: String,

    /// Maximum hops (default from config)
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Include the node itself at distance 0
    #[arg(long)]
    pub include_origin: bool,
}

/// Arguments for the clusters command.
#[derive(Args, Debug)]
pub struct ClustersArgs {
    /// Smallest cluster to show (default from config)
    #[arg(short, long)]
    pub min_size: Option<usize>,
}

/// Run the influence command.
pub async fn run_influence(args: InfluenceArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;

    let ranking: Vec<Influence> = match args.id {
        Some(id) => vec![engine.get_node_influence(&NodeId::from(id))?],
        None => engine.influence_ranking(args.limit)?,
    };

    if ctx.json_output {
        return ctx.print_json(&ranking);
    }

    let dim = Style::new().dim();
    heading("Influence");
    println!();
    if ranking.is_empty() {
        println!("{}", dim.apply_to("No nodes found"));
        return Ok(());
    }
    for influence in &ranking {
        let title = engine
            .get_node(&influence.node_id)
            .map(|n| n.title)
            .unwrap_or_default();
        println!(
            "{:>6.1} {} {}",
            influence.influence_score,
            truncate(&title, 50),
            dim.apply_to(format!(
                "({} in, {} out)",
                influence.inbound_count, influence.outbound_count
            ))
        );
    }
    Ok(())
}

/// Run the neighborhood command.
pub async fn run_neighborhood(args: NeighborhoodArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let id = NodeId::from(args.id);
    let depth = args
        .depth
        .unwrap_or(engine.config().graph.neighborhood_depth);

    let entries = if args.include_origin {
        engine.get_node_neighborhood_with_origin(&id, depth)?
    } else {
        engine.get_node_neighborhood(&id, depth)?
    };

    if ctx.json_output {
        let views: Vec<_> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "id": e.node.id,
                    "title": e.node.title,
                    "distance": e.distance,
                })
            })
            .collect();
        return ctx.print_json(&views);
    }

    let dim = Style::new().dim();
    heading(&format!("Neighborhood (depth {})", depth));
    println!();
    if entries.is_empty() {
        println!("{}", dim.apply_to("No connected nodes"));
    }
    for entry in &entries {
        println!(
            "{}{} {}",
            "  ".repeat(entry.distance),
            truncate(&entry.node.title, 60),
            dim.apply_to(format!("[{}]", entry.node.id))
        );
    }
    Ok(())
}

/// Run the clusters command.
pub async fn run_clusters(args: ClustersArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let min_size = args
        .min_size
        .unwrap_or(engine.config().graph.min_cluster_size);
    let clusters = engine.find_clusters(min_size)?;

    if ctx.json_output {
        return ctx.print_json(&clusters);
    }

    let dim = Style::new().dim();
    heading("Clusters");
    println!();
    if clusters.is_empty() {
        println!("{}", dim.apply_to("No clusters found"));
    }
    for (i, cluster) in clusters.iter().enumerate() {
        println!(
            "{} {}",
            console::style(format!("#{}", i + 1)).bold(),
            dim.apply_to(format!("{} nodes", cluster.size))
        );
        for member in &cluster.members {
            let title = engine.get_node(member).map(|n| n.title).unwrap_or_default();
            println!(
                "  {} {}",
                truncate(&title, 60),
                dim.apply_to(format!("[{}]", member))
            );
        }
    }
    Ok(())
}

/// Run the bridges command.
pub async fn run_bridges(ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let bridges = engine.get_bridge_nodes()?;

    if ctx.json_output {
        let views: Vec<_> = bridges
            .iter()
            .map(|b| {
                serde_json::json!({
                    "id": b.node.id,
                    "title": b.node.title,
                    "degree": b.degree,
                    "components_after_removal": b.components_after_removal,
                })
            })
            .collect();
        return ctx.print_json(&views);
    }

    let dim = Style::new().dim();
    heading("Bridge Nodes");
    println!();
    if bridges.is_empty() {
        println!("{}", dim.apply_to("No bridge nodes"));
    }
    for bridge in &bridges {
        println!(
            "{} {}",
            truncate(&bridge.node.title, 60),
            dim.apply_to(format!(
                "[{}] degree {}, splits into {}",
                bridge.node.id, bridge.degree, bridge.components_after_removal
            ))
        );
    }
    Ok(())
}
