//! The `swar list-providers` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use swar_providers::{load_config_from, SUPPORTED_PROVIDERS};

pub fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let active = config.classifier.as_ref();

    let mut table = Table::new();
    table.set_header(vec!["Provider", "Default model", "API key", "Configured"]);

    for info in SUPPORTED_PROVIDERS {
        let configured = match active {
            Some(p) if p.name() == info.name => format!("yes ({})", p.model()),
            _ => String::new(),
        };
        table.add_row(vec![
            Cell::new(info.name),
            Cell::new(info.default_model),
            Cell::new(if info.needs_api_key { "required" } else { "none" }),
            Cell::new(configured),
        ]);
    }

    println!("{table}");
    match active {
        Some(p) => println!(
            "Active classifier: {} (timeout {}ms)",
            p.name(),
            config.classifier_timeout_ms
        ),
        None => println!("No classifier configured; responses are graded locally."),
    }

    Ok(())
}
