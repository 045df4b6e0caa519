//! Recommend command - relationship suggestions.

use anyhow::{Result, bail};
use clap::Args;
use console::Style;
use noesis_graph::{RecommendOptions, SimilarityMethod, Suggestion};
use noesis_store::SuggestionOutcome;
use noesis_types::NodeId;

use super::{Context, heading};

/// Arguments for the recommend command.
#[derive(Args, Debug)]
pub struct RecommendArgs {
    /// Node ID
    pub id: String,

    /// Maximum suggestions (default from config)
    #[arg(short, long)]
    pub max: Option<usize>,

    /// Minimum similarity of candidates (default from config)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Ask the text generator to phrase explanations
    #[arg(long)]
    pub explain: bool,

    /// Accept the suggestion with this number (1-based), creating the edge
    #[arg(long)]
    pub accept: Vec<usize>,

    /// Reject the suggestion with this number (1-based)
    #[arg(long)]
    pub reject: Vec<usize>,
}

/// Run the recommend command.
pub async fn run(args: RecommendArgs, ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let id = NodeId::from(args.id);

    let mut options = RecommendOptions::new();
    if let Some(max) = args.max {
        options = options.with_max_suggestions(max);
    }
    if let Some(threshold) = args.threshold {
        options = options.with_threshold(threshold);
    }
    if args.explain {
        options = options.with_generator(true);
    }

    let suggestions = engine.recommend_links(&id, &options).await?;

    let mut accepted = Vec::new();
    for n in &args.accept {
        accepted.push(engine.accept_suggestion(pick(&suggestions, *n)?)?);
    }
    for n in &args.reject {
        engine.record_suggestion_outcome(pick(&suggestions, *n)?, SuggestionOutcome::Rejected)?;
    }

    if ctx.json_output {
        return ctx.print_json(&serde_json::json!({
            "suggestions": suggestions,
            "accepted_edges": accepted,
        }));
    }

    let dim = Style::new().dim();
    let cyan = Style::new().cyan();
    let green = Style::new().green();

    heading("Suggested Links");
    println!();
    if suggestions.is_empty() {
        println!("{}", dim.apply_to("No related knowledge found"));
        return Ok(());
    }

    for (i, suggestion) in suggestions.iter().enumerate() {
        let marker = if args.accept.contains(&(i + 1)) {
            green.apply_to("✓").to_string()
        } else {
            " ".to_string()
        };
        let lexical = if suggestion.method == SimilarityMethod::Lexical {
            "~"
        } else {
            ""
        };
        println!(
            "{} {} {} {}",
            marker,
            console::style(format!("{}.", i + 1)).bold(),
            cyan.apply_to(format!("{:.0}%{}", suggestion.confidence * 100.0, lexical)),
            suggestion.explanation
        );
        println!(
            "     {}",
            dim.apply_to(format!(
                "{} · {} [{}]",
                suggestion.relationship_type, suggestion.reasoning, suggestion.candidate_id
            ))
        );
    }

    if !accepted.is_empty() {
        println!();
        println!(
            "{} Created {} relationship(s)",
            green.apply_to("✓"),
            accepted.len()
        );
    }
    Ok(())
}

/// Suggestion number `n`, counting from 1.
fn pick(suggestions: &[Suggestion], n: usize) -> Result<&Suggestion> {
    match n.checked_sub(1).and_then(|i| suggestions.get(i)) {
        Some(s) => Ok(s),
        None => bail!(
            "No suggestion #{} ({} suggestions available)",
            n,
            suggestions.len()
        ),
    }
}
