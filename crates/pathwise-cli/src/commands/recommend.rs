//! The `pathwise recommend` command.

use anyhow::{Context, Result};

use pathwise_core::model::{ConceptId, UserId};
use pathwise_core::path::{CostPolicy, LearningPath};
use pathwise_core::recommend::Recommendation;

use super::{build_service, load_settings};
use crate::StoreArgs;

pub async fn execute(
    user: String,
    goal: String,
    policy: Option<String>,
    alternatives: Option<usize>,
    format: String,
    store: StoreArgs,
) -> Result<()> {
    let mut config = load_settings(&store)?;
    if let Some(policy) = policy {
        config.cost_policy = policy
            .parse::<CostPolicy>()
            .map_err(anyhow::Error::msg)
            .context("invalid --policy")?;
    }
    if let Some(n) = alternatives {
        config.max_alternatives = n;
    }

    let service = build_service(&config)?;
    let user = UserId::new(user);
    let goal = ConceptId::new(goal);

    let rec = service.recommend(&user, &goal).await?;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&rec)?);
        }
        _ => print_text(&rec),
    }

    Ok(())
}

fn describe(path: &LearningPath) -> String {
    let ids: Vec<&str> = path.concepts.iter().map(ConceptId::as_str).collect();
    match &path.start {
        Some(start) => format!("{start} => {}", ids.join(" -> ")),
        None => ids.join(" -> "),
    }
}

fn print_text(rec: &Recommendation) {
    println!(
        "Learning path to {} for {} (policy: {})",
        rec.goal, rec.user, rec.cost_policy
    );
    match &rec.best_path.start {
        Some(start) if rec.best_path.concepts == [start.clone()] => {
            println!("  {} is already mastered.", rec.goal);
        }
        Some(start) => println!("  Starting from: {start}"),
        None => println!("  Starting from: scratch"),
    }

    for (i, step) in rec.steps.iter().enumerate() {
        let lock = if step.locked { ", locked" } else { "" };
        println!(
            "  {}. {} ({})  cost {:.2}  score {:.2}  [{}{lock}]",
            i + 1,
            step.title,
            step.concept,
            step.cost,
            step.score,
            step.status
        );
    }

    println!(
        "Total cost: {:.2}  Estimated time: {:.1}h",
        rec.best_path.total_cost, rec.estimated_hours
    );

    if !rec.outstanding_prerequisites.is_empty() {
        let ids: Vec<&str> = rec
            .outstanding_prerequisites
            .iter()
            .map(ConceptId::as_str)
            .collect();
        println!("Outstanding prerequisites: {}", ids.join(", "));
    }

    if !rec.alternatives.is_empty() {
        println!("\nAlternatives:");
        for (i, alt) in rec.alternatives.iter().enumerate() {
            println!("  {}. {}  (cost {:.2})", i + 1, describe(alt), alt.total_cost);
        }
    }

    if rec.ready_concepts.is_empty() {
        println!("\nReady now: (none)");
    } else {
        let ids: Vec<&str> = rec.ready_concepts.iter().map(ConceptId::as_str).collect();
        println!("\nReady now: {}", ids.join(", "));
    }
}
