//! Align command - offline transcript scoring without a decoder

use std::path::Path;

use anyhow::{Context, Result};
use console::{style, Term};

use gramscore_core::stats::DEFAULT_CONFIDENCE_Z;
use gramscore_core::{Aligner, StatsAccumulator};

pub fn run(reference: &str, hypothesis: &str) -> Result<()> {
    let term = Term::stdout();
    let stats = score_files(Path::new(reference), Path::new(hypothesis))?;

    term.write_line(&format!("{}", style(overall_line(&stats)).bold()))?;

    let erring: Vec<_> = stats
        .ranked_tokens()
        .into_iter()
        .filter(|(_, c)| c.errors() > 0)
        .collect();
    if !erring.is_empty() {
        term.write_line("")?;
        term.write_line("tokens with errors, worst first:")?;
        for (token, c) in erring {
            term.write_line(&format!(
                "{:.2} % {} N={} C={} S={} D={} I={}",
                c.error_rate() * 100.0,
                token,
                c.all,
                c.correct,
                c.substitution,
                c.deletion,
                c.insertion
            ))?;
        }
    }

    Ok(())
}

/// Score two line-paired transcript files into one accumulator.
fn score_files(reference: &Path, hypothesis: &Path) -> Result<StatsAccumulator> {
    let reference_lines = read_lines(reference)?;
    let hypothesis_lines = read_lines(hypothesis)?;
    anyhow::ensure!(
        reference_lines.len() == hypothesis_lines.len(),
        "line count mismatch: {} has {} lines, {} has {}",
        reference.display(),
        reference_lines.len(),
        hypothesis.display(),
        hypothesis_lines.len()
    );

    let mut aligner = Aligner::new();
    let mut stats = StatsAccumulator::new();
    for (r, h) in reference_lines.iter().zip(&hypothesis_lines) {
        let r_tokens: Vec<&str> = r.split_whitespace().collect();
        let h_tokens: Vec<&str> = h.split_whitespace().collect();
        stats.record(&aligner.align(&r_tokens, &h_tokens));
    }
    Ok(stats)
}

fn overall_line(stats: &StatsAccumulator) -> String {
    let o = stats.overall();
    format!(
        "Overall -> {:.2} % +/- {:.2} % N={} C={} S={} D={} I={}",
        stats.word_error_rate(),
        stats.margin_of_error(DEFAULT_CONFIDENCE_Z),
        o.all,
        o.correct,
        o.substitution,
        o.deletion,
        o.insertion
    )
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read transcripts from {}", path.display()))?;
    Ok(contents.lines().map(str::to_string).collect())
}
