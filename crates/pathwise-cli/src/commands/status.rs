//! The `pathwise status` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use pathwise_core::model::UserId;

use super::{build_service, load_settings};
use crate::StoreArgs;

pub async fn execute(user: String, format: String, store: StoreArgs) -> Result<()> {
    let config = load_settings(&store)?;
    let service = build_service(&config)?;
    let user = UserId::new(user);

    let statuses = service.statuses(&user).await?;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
        _ => {
            let mut table = Table::new();
            table.set_header(vec!["Concept", "Title", "Score", "Attempts", "Status"]);
            for s in &statuses {
                table.add_row(vec![
                    Cell::new(&s.concept),
                    Cell::new(&s.title),
                    Cell::new(format!("{:.2}", s.score)),
                    Cell::new(s.attempts),
                    Cell::new(s.status),
                ]);
            }
            println!("Learner: {user}");
            println!("{table}");
        }
    }

    Ok(())
}
