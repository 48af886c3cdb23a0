//! The `swar run` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use swar_core::engine::{ProgressReporter, ScreeningEngine, ScriptedSession};
use swar_core::model::{QuestionBank, ResponseRecord};
use swar_core::parser;
use swar_core::report::SessionReport;
use swar_core::store::PerformanceStore;
use swar_providers::{build_adapter, load_config_from};

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_session_start(&self, student_id: &str, bank: &QuestionBank) {
        eprintln!(
            "  Starting: {student_id} :: {} ({} questions, grade {})",
            bank.name,
            bank.len(),
            bank.grade
        );
    }

    fn on_response(&self, _student_id: &str, record: &ResponseRecord) {
        let icon = if record.is_correct { "OK" } else { "MISS" };
        eprintln!(
            "  Q{} [{}] {} ({}ms)",
            record.question_id, record.difficulty, icon, record.elapsed_ms
        );
    }

    fn on_session_complete(&self, report: &SessionReport) {
        eprintln!(
            "  Done: {} :: {} score {}%",
            report.student_id, report.domain, report.score
        );
    }

    fn on_session_error(&self, student_id: &str, error: &str) {
        eprintln!("  ERROR: {student_id}: {error}");
    }

    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} succeeded, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    bank_path: PathBuf,
    answers_path: PathBuf,
    student: String,
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
    no_classifier: bool,
) -> Result<()> {
    anyhow::ensure!(!student.trim().is_empty(), "student id must not be empty");

    let config = load_config_from(config_path.as_deref())?;
    let bank = parser::parse_bank(&bank_path)?;
    for w in parser::validate_bank(&bank) {
        match w.question_id {
            Some(id) => tracing::warn!("{} [{id}]: {}", bank.id, w.message),
            None => tracing::warn!("{}: {}", bank.id, w.message),
        }
    }
    let answers = parser::parse_answers(&answers_path)?;

    let adapter = build_adapter(&config, !no_classifier);
    let engine = ScreeningEngine::new(
        Arc::new(PerformanceStore::new()),
        adapter,
        config.engine(!no_classifier),
    );

    eprintln!(
        "swar v{}: {} screening, {} questions, {} scripted answers",
        env!("CARGO_PKG_VERSION"),
        bank.domain,
        bank.len(),
        answers.len()
    );
    eprintln!();

    let script = ScriptedSession {
        student_id: student.clone(),
        bank: Arc::new(bank),
        answers,
    };
    let outcome = engine.run(std::slice::from_ref(&script), &ConsoleReporter).await;

    let Some(report) = outcome.reports.into_iter().next() else {
        anyhow::bail!("session for '{student}' did not complete");
    };

    print_breakdown(&report);
    print_summary(&report);

    if let Some(analysis) = engine.store().analysis(&student, report.domain) {
        println!(
            "Competency: {:.0}  Next difficulty: {}  Trend: {:?}",
            analysis.profile.competency,
            analysis.recommendations.next_difficulty,
            analysis.pattern.trend
        );
    }

    let path = output.unwrap_or_else(|| config.output_dir.join(report.file_name()));
    report.save_json(&path)?;
    eprintln!("Report saved to: {}", path.display());

    Ok(())
}

fn print_breakdown(report: &SessionReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec![
        "#",
        "Question",
        "Kind",
        "Difficulty",
        "Expected",
        "Said",
        "Correct",
        "Confidence",
        "Time",
        "Reason",
    ]);

    for (i, r) in report.breakdown.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(r.question_id),
            Cell::new(r.kind),
            Cell::new(r.difficulty),
            Cell::new(&r.expected),
            Cell::new(&r.transcript),
            Cell::new(if r.is_correct { "yes" } else { "no" }),
            Cell::new(format!("{}%", r.confidence)),
            Cell::new(format!("{}ms", r.elapsed_ms)),
            Cell::new(&r.reason),
        ]);
    }

    println!("{table}");
}

fn print_summary(report: &SessionReport) {
    println!();
    println!(
        "Score: {}% ({} of {} correct, {} answered)",
        report.score, report.correct, report.total_questions, report.answered
    );
    println!("Band: {}", report.band);
    println!(
        "Flagged: {}",
        if report.flagged {
            "yes, professional evaluation recommended"
        } else {
            "no"
        }
    );
    println!("{}", report.narrative);

    let diagnostic = &report.diagnostic;
    if !diagnostic.strong_areas.is_empty() {
        println!("Strong areas: {}", join(&diagnostic.strong_areas));
    }
    if !diagnostic.weak_areas.is_empty() {
        println!("Weak areas: {}", join(&diagnostic.weak_areas));
    }
    if !diagnostic.risk_indicators.is_empty() {
        println!("Risks: {}", join(&diagnostic.risk_indicators));
    }
    println!("Recommended: {}", diagnostic.recommended_intervention);
    for step in &diagnostic.follow_up {
        println!("  - {step}");
    }

    if let Some(refinement) = &report.refinement {
        let agree = refinement
            .verdicts
            .iter()
            .zip(&report.breakdown)
            .filter(|(v, r)| v.is_correct == r.is_correct)
            .count();
        println!(
            "Classifier: {} ({:?}), agrees on {agree}/{} responses",
            refinement.provider,
            refinement.source,
            report.breakdown.len()
        );
        if let Some(narrative) = &refinement.narrative {
            println!("Classifier notes: {narrative}");
        }
        if let Some(d) = &refinement.diagnostic {
            if let Some(intervention) = &d.recommended_intervention {
                println!("Classifier recommends: {intervention}");
            }
            if !d.risk_indicators.is_empty() {
                println!("Classifier risks: {}", d.risk_indicators.join(", "));
            }
        }
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}
