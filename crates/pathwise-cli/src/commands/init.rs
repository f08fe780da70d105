//! The `pathwise init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create pathwise.toml
    if std::path::Path::new("pathwise.toml").exists() {
        println!("pathwise.toml already exists, skipping.");
    } else {
        std::fs::write("pathwise.toml", SAMPLE_CONFIG)?;
        println!("Created pathwise.toml");
    }

    // Create example catalog
    std::fs::create_dir_all("catalogs")?;
    let example_path = std::path::Path::new("catalogs/example.toml");
    if example_path.exists() {
        println!("catalogs/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_CATALOG)?;
        println!("Created catalogs/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: pathwise validate --catalog catalogs");
    println!("  2. Run: pathwise submit --user alice --concept variables --score 0.9");
    println!("  3. Run: pathwise recommend --user alice --goal arrays");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# pathwise configuration

catalog = "catalogs"
ledger = "pathwise-ledger.json"

# Score at or above which a concept counts as mastered.
mastery_threshold = 0.6

# uniform | complexity | mastery-weighted
cost_policy = "mastery-weighted"
min_edge_cost = 0.01

max_alternatives = 3
path_enumeration_limit = 64
max_conflict_retries = 3
"#;

const EXAMPLE_CATALOG: &str = r#"[catalog]
id = "example"
name = "Example Catalog"
description = "A small catalog to get started"

[[concepts]]
id = "variables"
title = "Variables"
complexity = 1
estimated_learning_hours = 1.0

[[concepts]]
id = "conditionals"
title = "Conditionals"
complexity = 1
estimated_learning_hours = 1.0
prerequisites = ["variables"]

[[concepts]]
id = "loops"
title = "Loops"
complexity = 2
estimated_learning_hours = 1.5
prerequisites = ["conditionals"]

[[concepts]]
id = "functions"
title = "Functions"
complexity = 2
estimated_learning_hours = 2.0
prerequisites = ["variables"]

[[concepts]]
id = "arrays"
title = "Arrays"
complexity = 2
estimated_learning_hours = 2.0
prerequisites = ["loops"]

[[concepts]]
id = "recursion"
title = "Recursion"
complexity = 3
estimated_learning_hours = 3.0
prerequisites = ["functions", "conditionals"]
"#;
