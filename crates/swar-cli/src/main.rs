//! swar CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "swar", version, about = "Speech-first adaptive screening for dyslexia and dyscalculia")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted screening session
    Run {
        /// Question bank TOML file
        #[arg(long)]
        bank: PathBuf,

        /// Scripted answers TOML file
        #[arg(long)]
        answers: PathBuf,

        /// Student identifier
        #[arg(long)]
        student: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Report file (default: <output_dir>/<student>-<domain>-<id>.json)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Skip the external classifier and grade locally only
        #[arg(long)]
        no_classifier: bool,
    },

    /// Re-score a saved session report
    Score {
        /// Report JSON written by `swar run`
        #[arg(long)]
        responses: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate question bank TOML files
    Validate {
        /// Path to question bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// List supported classifier providers
    ListProviders {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example question bank
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "swar=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            bank,
            answers,
            student,
            config,
            output,
            no_classifier,
        } => commands::run::execute(bank, answers, student, config, output, no_classifier).await,
        Commands::Score { responses, config } => commands::score::execute(responses, config),
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::ListProviders { config } => commands::list_providers::execute(config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
