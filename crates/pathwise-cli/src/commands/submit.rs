//! The `pathwise submit` command.

use anyhow::Result;

use pathwise_core::model::{ConceptId, UserId};

use super::{build_service, load_settings};
use crate::StoreArgs;

pub async fn execute(user: String, concept: String, score: f64, store: StoreArgs) -> Result<()> {
    let config = load_settings(&store)?;
    let service = build_service(&config)?;
    let user = UserId::new(user);
    let concept = ConceptId::new(concept);

    let record = service
        .submit_result_with_retry(&user, &concept, score, config.max_conflict_retries)
        .await?;

    let status = service
        .statuses(&user)
        .await?
        .into_iter()
        .find(|s| s.concept == concept)
        .map(|s| s.status.to_string())
        .unwrap_or_default();

    println!(
        "Recorded {concept} for {user}: score {:.2} after {} attempt(s) [{status}]",
        record.score, record.attempts
    );
    println!(
        "Updated at {}",
        record.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
    );

    Ok(())
}
