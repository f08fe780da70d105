//! The `pathwise prerequisites` command.

use anyhow::Result;

use super::{build_service, load_settings};
use crate::StoreArgs;

pub async fn execute(concept: String, store: StoreArgs) -> Result<()> {
    let config = load_settings(&store)?;
    let service = build_service(&config)?;
    let graph = service.graph().await?;

    let Some(closure) = graph.prerequisite_closure(&concept) else {
        anyhow::bail!("unknown concept: {concept}");
    };

    if closure.is_empty() {
        println!("{concept} has no prerequisites.");
        return Ok(());
    }

    println!("Prerequisites of {concept} ({}):", closure.len());
    for (i, id) in closure.iter().enumerate() {
        match graph.concept(id.as_str()) {
            Some(c) => println!("  {}. {} ({})", i + 1, c.title, id),
            None => println!("  {}. {} (missing from catalog)", i + 1, id),
        }
    }

    Ok(())
}
