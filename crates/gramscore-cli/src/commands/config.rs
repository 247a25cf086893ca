//! Config command - manage configuration

use anyhow::Result;
use console::{style, Term};
use gramscore_core::Config;

pub fn show(config: &Config) -> Result<()> {
    let term = Term::stdout();

    term.write_line(&format!("{}", style("gramscore Configuration").bold()))?;
    term.write_line("")?;

    let model_dir = config
        .model_dir
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string());
    term.write_line(&format!("Model directory:  {}", style(model_dir).cyan()))?;

    let decoder = if config.decoder_command.is_empty() {
        "(not set)".to_string()
    } else {
        config.decoder_command.join(" ")
    };
    term.write_line(&format!("Decoder command:  {}", style(decoder).cyan()))?;
    term.write_line(&format!("Workers:          {}", style(config.workers).cyan()))?;

    let lexicon = config
        .lexicon_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    term.write_line(&format!("Lexicon:          {}", style(lexicon).cyan()))?;

    term.write_line("")?;
    term.write_line(&format!("{}", style("Polling:").dim()))?;
    term.write_line(&format!("  Retries:        {}", config.poll.retries))?;
    term.write_line(&format!("  Interval:       {} ms", config.poll.interval_ms))?;

    Ok(())
}

pub fn set_workers(config: &mut Config, workers: usize) -> Result<()> {
    anyhow::ensure!(workers > 0, "worker count must be at least 1");
    config.workers = workers;
    config.save(None)?;
    println!("Workers set to {workers}");
    Ok(())
}

pub fn set_decoder(config: &mut Config, command: Vec<String>) -> Result<()> {
    config.decoder_command = command;
    config.save(None)?;
    println!("Decoder command set to: {}", config.decoder_command.join(" "));
    Ok(())
}

pub fn show_path() -> Result<()> {
    println!("{}", Config::default_config_path()?.display());
    Ok(())
}
