//! Eval command - batch evaluation of a recorded dataset

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};

use gramscore_core::batch::{BatchError, BatchOptions, BatchOrchestrator};
use gramscore_core::bridge::SubprocessDecoderFactory;
use gramscore_core::{filter_records, read_dataset, read_lexicon, Config};

pub async fn run(
    config: &Config,
    dataset: &str,
    model_dir: Option<&str>,
    lexicon: Option<&str>,
    parallel: Option<usize>,
    output: Option<&str>,
) -> Result<()> {
    let term = Term::stdout();

    anyhow::ensure!(
        !config.decoder_command.is_empty(),
        "no decoder command configured; run `gramscore config set-decoder ...` first"
    );

    let records = read_dataset(Path::new(dataset))?;
    let lexicon_path = lexicon
        .map(PathBuf::from)
        .or_else(|| config.lexicon_file.clone());
    let lexicon = match &lexicon_path {
        Some(path) => Some(read_lexicon(path)?),
        None => None,
    };
    let total = records.len();
    let records = filter_records(records, lexicon.as_ref());
    if records.len() < total {
        term.write_line(&format!(
            "{} Skipped {} of {} utterances (missing audio or out of vocabulary)",
            style("!").yellow(),
            total - records.len(),
            total
        ))?;
    }
    anyhow::ensure!(!records.is_empty(), "no evaluable utterances in {dataset}");
    tracing::debug!("evaluating {} utterances", records.len());

    let model_dir = model_dir.map(PathBuf::from).or_else(|| config.model_dir.clone());
    let factory = SubprocessDecoderFactory::new(config.decoder_command.clone(), model_dir);
    let options = BatchOptions {
        workers: parallel.unwrap_or(config.workers),
        poll_retries: config.poll.retries,
        poll_interval: config.poll_interval(),
    };
    let orchestrator = BatchOrchestrator::new(&factory, options);

    // Set up Ctrl+C handler
    let cancel = Arc::new(AtomicBool::new(false));
    let c = cancel.clone();
    ctrlc::set_handler(move || {
        c.store(true, Ordering::SeqCst);
    })?;

    term.write_line(&format!(
        "{} Evaluating {} utterances (press {} to abort)",
        style(">").green(),
        records.len(),
        style("Ctrl+C").cyan()
    ))?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Evaluating...");

    let result = std::thread::scope(|s| {
        let cancel = cancel.clone();
        let records = &records;
        let orchestrator = &orchestrator;
        let handle = s.spawn(move || orchestrator.run(records, &cancel));
        while !handle.is_finished() {
            pb.tick();
            std::thread::sleep(Duration::from_millis(100));
        }
        pb.finish_and_clear();
        handle.join().expect("evaluation thread panicked")
    });

    let report = match result {
        Ok(report) => report,
        Err(BatchError::Interrupted) => {
            term.write_line(&format!("{} Evaluation aborted", style("x").red()))?;
            return Ok(());
        }
        Err(e) => return Err(e).context("evaluation failed"),
    };

    let rendered = report.render();
    match output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write report to {path}"))?;
            term.write_line(&format!(
                "{} {}",
                style(report.overall_line()).bold(),
                style(format!("(full report: {path})")).dim()
            ))?;
        }
        None => {
            term.write_line(&rendered)?;
        }
    }

    Ok(())
}
