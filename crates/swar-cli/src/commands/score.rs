//! The `swar score` command.

use std::path::PathBuf;

use anyhow::Result;

use swar_core::report::SessionReport;
use swar_providers::load_config_from;

pub fn execute(report_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let saved = SessionReport::load_json(&report_path)?;
    let rescored = saved.rescore(&config.scoring());

    println!(
        "Report: {} ({} {}, grade {})",
        rescored.id, rescored.student_id, rescored.domain, rescored.grade
    );
    println!(
        "Score: {}% ({} of {} correct)",
        rescored.score, rescored.correct, rescored.total_questions
    );
    println!("Band: {}", rescored.band);
    println!("Flagged: {}", if rescored.flagged { "yes" } else { "no" });

    let unchanged = rescored.id == saved.id
        && rescored.score == saved.score
        && rescored.flagged == saved.flagged
        && rescored.band == saved.band;
    if unchanged {
        println!("Matches saved report.");
    } else {
        println!(
            "Differs from saved report (saved: {}%, flagged {}, band {}).",
            saved.score,
            if saved.flagged { "yes" } else { "no" },
            saved.band
        );
    }

    Ok(())
}
