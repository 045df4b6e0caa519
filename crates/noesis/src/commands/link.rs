//! Link and links commands - manual relationships.

use anyhow::Result;
use clap::Args;
use console::Style;
use noesis_store::KnowledgeStore;
use noesis_types::{NodeId, Relationship, RelationshipType};

use super::{Context, heading};

/// Arguments for the link command.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Source node ID
    pub source: String,

    /// Target node ID
    pub target: String,

    /// Relationship type (REFERENCES, EXPANDS_ON, CONTRADICTS, SUPPORTS, IS_A, related_to, ...)
    #[arg(short = 't', long = "type", default_value = "REFERENCES")]
    pub relationship_type: String,

    /// Why the two nodes are related
    #[arg(short, long)]
    pub comment: Option<String>,

    /// Strength of the relationship (0.1 to 2.0)
    #[arg(short, long)]
    pub weight: Option<f32>,
}

/// Arguments for the links command.
#[derive(Args, Debug)]
pub struct LinksArgs {
    /// Node ID
    pub id: String,
}

/// Run the link command.
pub async fn run_link(args: LinkArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let relationship_type: RelationshipType = args.relationship_type.parse()?;
    let source = NodeId::from(args.source);
    let target = NodeId::from(args.target);

    let edge_id = engine.create_relationship(
        &source,
        &target,
        relationship_type,
        args.comment.as_deref(),
        args.weight,
    )?;

    if ctx.json_output {
        ctx.print_json(&serde_json::json!({
            "id": edge_id,
            "source_id": source,
            "target_id": target,
            "relationship_type": relationship_type,
        }))
    } else {
        let green = Style::new().green();
        let dim = Style::new().dim();
        println!(
            "{} {} {} {} {}",
            green.apply_to("✓"),
            source,
            relationship_type,
            target,
            dim.apply_to(format!("[{}]", edge_id))
        );
        Ok(())
    }
}

/// Run the links command.
pub async fn run_links(args: LinksArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let id = NodeId::from(args.id);
    let edges = store.list_edges_for_node(&id)?;

    if ctx.json_output {
        return ctx.print_json(&edges);
    }

    let dim = Style::new().dim();
    let title = |node: &NodeId| -> String {
        store
            .get_node(node)
            .ok()
            .flatten()
            .map(|n| n.title)
            .unwrap_or_else(|| node.to_string())
    };

    heading("Backlinks");
    if edges.inbound.is_empty() {
        println!("{}", dim.apply_to("none"));
    }
    for edge in &edges.inbound {
        println!("  ← {} {}", edge.relationship_type, title(&edge.source_id));
        print_details(edge);
    }
    println!();

    heading("Outlinks");
    if edges.outbound.is_empty() {
        println!("{}", dim.apply_to("none"));
    }
    for edge in &edges.outbound {
        println!("  → {} {}", edge.relationship_type, title(&edge.target_id));
        print_details(edge);
    }
    Ok(())
}

fn print_details(edge: &Relationship) {
    let dim = Style::new().dim();
    let mut details = vec![format!("weight {:.1}", edge.weight)];
    if let Some(confidence) = edge.confidence {
        details.push(format!("confidence {:.0}%", confidence * 100.0));
    }
    if let Some(ref comment) = edge.comment {
        details.push(comment.clone());
    }
    println!("    {}", dim.apply_to(details.join(" · ")));
}
