//! Node command - knowledge node management.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::Style;
use noesis_store::{EmbeddingFilter, KnowledgeStore, NodeFilter};
use noesis_types::{KnowledgeNode, NodeId, NodeType, Timestamp};
use serde::Serialize;

use super::{Context, heading, truncate};

/// Arguments for the node command.
#[derive(Args, Debug)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub command: NodeCommand,
}

#[derive(Subcommand, Debug)]
pub enum NodeCommand {
    /// Add a knowledge node
    Add {
        /// Node title
        title: String,

        /// Node content
        #[arg(short, long, default_value = "")]
        content: String,

        /// Node type (knowledge, concept, fact, question, idea, ...)
        #[arg(short = 't', long = "type", default_value = "knowledge")]
        node_type: String,

        /// Tags for the node
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Short summary, embedded alongside the content
        #[arg(long)]
        summary: Option<String>,

        /// Owning user
        #[arg(long)]
        owner: Option<String>,

        /// Embed the node right away
        #[arg(long)]
        embed: bool,
    },

    /// List nodes, most recently updated first
    List {
        /// Only nodes of this type
        #[arg(short = 't', long = "type")]
        node_type: Option<String>,

        /// Only nodes carrying all of these tags
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Only nodes without an embedding
        #[arg(long)]
        missing_embeddings: bool,

        /// Include archived nodes
        #[arg(long)]
        all: bool,

        /// Maximum nodes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show a node and its relationships
    Show {
        /// Node ID
        id: String,
    },

    /// Delete a node and all of its relationships
    Delete {
        /// Node ID
        id: String,
    },

    /// Show database statistics
    Stats,
}

/// A node without its vector, for display.
#[derive(Debug, Serialize)]
pub struct NodeView<'a> {
    pub id: &'a NodeId,
    pub title: &'a str,
    pub node_type: NodeType,
    pub tags: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a str>,
    pub content: &'a str,
    pub has_embedding: bool,
    pub is_active: bool,
    pub updated_at: Timestamp,
}

impl<'a> From<&'a KnowledgeNode> for NodeView<'a> {
    fn from(node: &'a KnowledgeNode) -> Self {
        Self {
            id: &node.id,
            title: &node.title,
            node_type: node.node_type,
            tags: node.tags.iter().map(String::as_str).collect(),
            summary: node.metadata.summary.as_deref(),
            content: &node.content,
            has_embedding: node.has_embedding(),
            is_active: node.is_active,
            updated_at: node.updated_at,
        }
    }
}

/// Run the node command.
pub async fn run(args: NodeArgs, ctx: &Context) -> Result<()> {
    match args.command {
        NodeCommand::Add {
            title,
            content,
            node_type,
            tags,
            summary,
            owner,
            embed,
        } => {
            cmd_add(ctx, title, content, &node_type, tags, summary, owner, embed).await
        }
        NodeCommand::List {
            node_type,
            tags,
            missing_embeddings,
            all,
            limit,
        } => cmd_list(ctx, node_type.as_deref(), tags, missing_embeddings, all, limit),
        NodeCommand::Show { id } => cmd_show(ctx, &NodeId::from(id)),
        NodeCommand::Delete { id } => cmd_delete(ctx, &NodeId::from(id)),
        NodeCommand::Stats => cmd_stats(ctx),
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_add(
    ctx: &Context,
    title: String,
    content: String,
    node_type: &str,
    tags: Vec<String>,
    summary: Option<String>,
    owner: Option<String>,
    embed: bool,
) -> Result<()> {
    if title.trim().is_empty() {
        bail!("Node title cannot be empty");
    }

    let mut node = KnowledgeNode::new(title, content)
        .with_type(node_type.parse()?)
        .with_tags(tags);
    if let Some(summary) = summary {
        node = node.with_summary(summary);
    }
    if let Some(owner) = owner {
        node = node.with_owner(owner);
    }

    let node = if embed {
        let engine = ctx.engine()?;
        engine.store().insert_node(&node)?;
        engine.embed_node(&node.id).await?
    } else {
        ctx.open_store()?.insert_node(&node)?;
        node
    };

    if ctx.json_output {
        ctx.print_json(&NodeView::from(&node))?;
    } else {
        let green = Style::new().green();
        let dim = Style::new().dim();
        println!(
            "{} Node created: {}{}",
            green.apply_to("✓"),
            dim.apply_to(&node.id),
            if node.has_embedding() { " (embedded)" } else { "" }
        );
    }
    Ok(())
}

fn cmd_list(
    ctx: &Context,
    node_type: Option<&str>,
    tags: Vec<String>,
    missing_embeddings: bool,
    all: bool,
    limit: usize,
) -> Result<()> {
    let mut filter = NodeFilter::new().with_tags(tags);
    if let Some(node_type) = node_type {
        filter = filter.with_types([node_type.parse::<NodeType>()?]);
    }
    if missing_embeddings {
        filter = filter.with_embedding(EmbeddingFilter::Missing);
    }
    if all {
        filter = filter.including_inactive();
    }

    let nodes = ctx.open_store()?.list_nodes(&filter)?;

    if ctx.json_output {
        let views: Vec<NodeView<'_>> = nodes.iter().take(limit).map(NodeView::from).collect();
        return ctx.print_json(&views);
    }

    let dim = Style::new().dim();
    heading("Nodes");
    println!();
    if nodes.is_empty() {
        println!("{}", dim.apply_to("No nodes found"));
        return Ok(());
    }

    for node in nodes.iter().take(limit) {
        let marker = if node.has_embedding() { " " } else { "○" };
        println!(
            "{} {} {} {}",
            marker,
            dim.apply_to(format!("[{}]", node.id)),
            truncate(&node.title, 60),
            dim.apply_to(format!("({})", node.node_type))
        );
    }
    if nodes.len() > limit {
        println!();
        println!(
            "{}",
            dim.apply_to(format!("... and {} more", nodes.len() - limit))
        );
    }
    Ok(())
}

fn cmd_show(ctx: &Context, id: &NodeId) -> Result<()> {
    let store = ctx.open_store()?;
    let Some(node) = store.get_node(id)? else {
        bail!("Node not found: {}", id);
    };
    let edges = store.list_edges_for_node(id)?;

    if ctx.json_output {
        return ctx.print_json(&serde_json::json!({
            "node": NodeView::from(&node),
            "edges": edges,
        }));
    }

    let dim = Style::new().dim();
    heading(&node.title);
    println!("{} {}", dim.apply_to("ID:      "), node.id);
    println!("{} {}", dim.apply_to("Type:    "), node.node_type);
    if !node.tags.is_empty() {
        let tags: Vec<_> = node.tags.iter().map(String::as_str).collect();
        println!("{} {}", dim.apply_to("Tags:    "), tags.join(", "));
    }
    println!(
        "{} {}",
        dim.apply_to("Embedded:"),
        if node.has_embedding() { "yes" } else { "no" }
    );
    println!(
        "{} {}",
        dim.apply_to("Updated: "),
        node.updated_at.format("%Y-%m-%d %H:%M")
    );
    if let Some(ref summary) = node.metadata.summary {
        println!();
        println!("{}", summary);
    }
    if !node.content.is_empty() {
        println!();
        println!("{}", node.content);
    }
    println!();
    println!(
        "{}",
        dim.apply_to(format!(
            "{} backlinks, {} outlinks",
            edges.inbound.len(),
            edges.outbound.len()
        ))
    );
    Ok(())
}

fn cmd_delete(ctx: &Context, id: &NodeId) -> Result<()> {
    if !ctx.open_store()?.delete_node(id)? {
        bail!("Node not found: {}", id);
    }

    if ctx.json_output {
        ctx.print_json(&serde_json::json!({ "deleted": id }))
    } else {
        let green = Style::new().green();
        println!("{} Node deleted: {}", green.apply_to("✓"), id);
        Ok(())
    }
}

fn cmd_stats(ctx: &Context) -> Result<()> {
    let stats = ctx.open_store()?.stats()?;

    if ctx.json_output {
        return ctx.print_json(&stats);
    }

    let dim = Style::new().dim();
    heading("Knowledge Store");
    println!("{} {}", dim.apply_to("Database:  "), ctx.database.display());
    println!(
        "{} {} ({} active)",
        dim.apply_to("Nodes:     "),
        stats.node_count,
        stats.active_node_count
    );
    println!("{} {}", dim.apply_to("Embedded:  "), stats.embedded_node_count);
    println!("{} {}", dim.apply_to("Edges:     "), stats.edge_count);
    println!("{} {}", dim.apply_to("Feedback:  "), stats.feedback_count);
    println!(
        "{} {} dims, {}",
        dim.apply_to("Embeddings:"),
        stats.embedding_dimensions,
        stats.embedding_provider.as_deref().unwrap_or("none yet")
    );
    Ok(())
}
