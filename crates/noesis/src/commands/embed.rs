//! Embed command - bulk and single-node embedding.

use anyhow::Result;
use clap::Args;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use noesis_graph::{BulkOptions, BulkProgress};
use noesis_types::NodeId;
use tokio_util::sync::CancellationToken;

use super::Context;

/// Arguments for the embed command.
#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Embed only these nodes (interactive, no retry)
    #[arg(long = "node")]
    pub nodes: Vec<String>,

    /// Re-embed nodes that already have an embedding
    #[arg(long)]
    pub all: bool,

    /// Include archived nodes
    #[arg(long)]
    pub include_inactive: bool,
}

/// Run the embed command.
pub async fn run(args: EmbedArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;

    if !args.nodes.is_empty() {
        let green = Style::new().green();
        let mut embedded = Vec::new();
        for id in args.nodes {
            let node = engine.embed_node(&NodeId::from(id)).await?;
            if !ctx.json_output {
                println!("{} Embedded {}", green.apply_to("✓"), node.id);
            }
            embedded.push(node.id);
        }
        if ctx.json_output {
            ctx.print_json(&serde_json::json!({ "embedded": embedded }))?;
        }
        return Ok(());
    }

    let options = BulkOptions {
        only_missing: !args.all,
        include_inactive: args.include_inactive,
    };

    // Ctrl-C stops the job after the current item.
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let bar = if ctx.json_output {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );
        bar
    };
    let progress_bar = bar.clone();
    let on_progress = move |p: &BulkProgress| {
        progress_bar.set_length(p.total as u64);
        progress_bar.set_position(p.processed as u64);
        if p.failed_count > 0 {
            progress_bar.set_message(format!("{} failed", p.failed_count));
        }
    };

    let report = engine
        .generate_embeddings(&options, &cancel, Some(&on_progress))
        .await?;
    bar.finish_and_clear();

    if ctx.json_output {
        return ctx.print_json(&report);
    }

    let green = Style::new().green();
    let red = Style::new().red();
    let yellow = Style::new().yellow();
    let dim = Style::new().dim();

    if report.total == 0 {
        println!("{}", dim.apply_to("Nothing to embed"));
        return Ok(());
    }

    println!(
        "{} Embedded {} of {} nodes",
        green.apply_to("✓"),
        report.success_count,
        report.total
    );
    if report.failed_count > 0 {
        println!("{} {} failed", red.apply_to("✗"), report.failed_count);
        if ctx.verbose {
            for id in &report.failed_ids {
                println!("  {}", dim.apply_to(id));
            }
        }
    }
    if report.cancelled {
        println!(
            "{} Cancelled, {} nodes not processed",
            yellow.apply_to("!"),
            report.total - report.processed()
        );
    }
    Ok(())
}
