//! gramscore CLI - recognition accuracy evaluation for grammar-based recognizers

use anyhow::Result;
use clap::{Parser, Subcommand};
use gramscore_core::Config;

mod commands;

#[derive(Parser)]
#[command(name = "gramscore")]
#[command(version)]
#[command(about = "Recognition accuracy evaluation for grammar-based recognizers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose output (show per-utterance debug info)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a recorded dataset against the recognizer (press Ctrl+C to abort)
    Eval {
        /// Path to the tab-separated dataset file
        dataset: String,

        /// Recognizer model directory (overrides config)
        #[arg(long)]
        model_dir: Option<String>,

        /// Lexicon file; utterances with out-of-vocabulary words are skipped
        #[arg(long)]
        lexicon: Option<String>,

        /// Number of parallel workers (overrides config)
        #[arg(short, long)]
        parallel: Option<usize>,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Score a hypothesis transcript file against a reference transcript file
    Align {
        /// Reference transcripts, one utterance per line
        reference: String,

        /// Hypothesis transcripts, line-paired with the reference
        hypothesis: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set the worker pool size
    SetWorkers {
        /// Number of parallel workers
        workers: usize,
    },

    /// Set the decoder command line
    SetDecoder {
        /// Program and arguments that start a decoder process
        #[arg(num_args = 1.., required = true)]
        command: Vec<String>,
    },

    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .init();

    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Eval {
            dataset,
            model_dir,
            lexicon,
            parallel,
            output,
        } => {
            commands::eval::run(
                &config,
                &dataset,
                model_dir.as_deref(),
                lexicon.as_deref(),
                parallel,
                output.as_deref(),
            )
            .await
        }

        Commands::Align {
            reference,
            hypothesis,
        } => commands::align::run(&reference, &hypothesis),

        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&config),
            ConfigAction::SetWorkers { workers } => {
                commands::config::set_workers(&mut config, workers)
            }
            ConfigAction::SetDecoder { command } => {
                commands::config::set_decoder(&mut config, command)
            }
            ConfigAction::Path => commands::config::show_path(),
        },
    }
}
