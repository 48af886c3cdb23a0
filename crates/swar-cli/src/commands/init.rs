//! The `swar init` command.

use anyhow::{Context, Result};

pub fn execute() -> Result<()> {
    // Create swar.toml
    if std::path::Path::new("swar.toml").exists() {
        println!("swar.toml already exists, skipping.");
    } else {
        std::fs::write("swar.toml", SAMPLE_CONFIG).context("failed to write swar.toml")?;
        println!("Created swar.toml");
    }

    // Create example question bank
    std::fs::create_dir_all("question-banks")?;
    let example_path = std::path::Path::new("question-banks/example.toml");
    if example_path.exists() {
        println!("question-banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_BANK)
            .context("failed to write question-banks/example.toml")?;
        println!("Created question-banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Optionally configure a classifier in swar.toml");
    println!("  2. Run: swar validate --bank question-banks/example.toml");
    println!("  3. Run: swar run --bank question-banks/example.toml --answers answers.toml --student s1");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# swar configuration

# Sessions scoring below this are flagged for professional evaluation.
flag_threshold = 75
# A session ends after this many responses per question.
max_responses_factor = 2
classifier_timeout_ms = 8000
output_dir = "./swar-reports"

[bands]
excellent = 85
good = 70
moderate = 55

# Optional external classifier. Without it every answer is graded locally.
# SWAR_LLM_API_KEY overrides api_key.
#
# [classifier]
# type = "openai"          # openai | anthropic | gemini | ollama
# api_key = "${OPENAI_API_KEY}"
# model = "gpt-4o-mini"
"#;

const EXAMPLE_BANK: &str = r#"[bank]
id = "example"
name = "Example reading bank"
grade = 1
domain = "dyslexia"

[[questions]]
id = 1
prompt = "Read this word: cat"
expected = "cat"
kind = "word"

[[questions]]
id = 2
prompt = "Read this word: dog"
expected = "dog"
kind = "word"

[[questions]]
id = 3
prompt = "Read this word: sun"
expected = "sun"
kind = "word"

[[questions]]
id = 4
prompt = "Read this sentence: I see a cat."
expected = "I see a cat"
kind = "sentence"

[[questions]]
id = 5
prompt = "Read this sentence: The dog can run."
expected = "The dog can run"
kind = "sentence"
"#;
