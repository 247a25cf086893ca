//! Report assembly and text rendering for a finished batch run.

use std::fmt::Write as _;

use crate::evaluate::{UtteranceOutcome, Verdict};
use crate::stats::{StatsAccumulator, DEFAULT_CONFIDENCE_Z};

/// Command-level recognition tallies across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandTallies {
    /// Total commands evaluated.
    pub cmds: usize,
    /// Audio pass disagreed with the replay pass (rule or options).
    pub cmd_not_correct_output: usize,
    /// Audio pass fired a different rule than the replay pass.
    pub cmd_not_correct_rule: usize,
    /// Rules agreed but at least one replay-pass binding did not.
    pub cmd_not_correct_options: usize,
    /// Audio pass produced no interpretation at all.
    pub cmd_not_recog_output: usize,
    /// Replay of the reference text itself matched no grammar rule; the
    /// dataset transcript is outside the grammar.
    pub cmd_not_recog_input: usize,
}

impl CommandTallies {
    fn count(&mut self, outcome: &UtteranceOutcome) {
        self.cmds += 1;
        if outcome.overall_correctness == Verdict::Incorrect {
            self.cmd_not_correct_output += 1;
        }
        if outcome.rule_match == Verdict::Incorrect {
            self.cmd_not_correct_rule += 1;
        }
        if outcome.options_match == Verdict::Incorrect {
            self.cmd_not_correct_options += 1;
        }
        if outcome.decoded.is_none() {
            self.cmd_not_recog_output += 1;
        }
        if outcome.mimicked.is_none() {
            self.cmd_not_recog_input += 1;
        }
    }
}

/// The complete result of a batch run: cumulative token statistics,
/// command tallies, and per-utterance outcomes sorted worst-first.
#[derive(Debug)]
pub struct Report {
    pub stats: StatsAccumulator,
    pub tallies: CommandTallies,
    pub outcomes: Vec<UtteranceOutcome>,
}

impl Report {
    /// Assemble a report from outcomes in dataset order.
    ///
    /// Statistics are accumulated in dataset order before any sorting, so
    /// token first-seen order (and with it ranking tie-breaks) does not
    /// depend on how the outcomes were produced.
    pub fn build(outcomes: Vec<UtteranceOutcome>) -> Report {
        let mut stats = StatsAccumulator::new();
        let mut tallies = CommandTallies::default();
        for outcome in &outcomes {
            stats.record(&outcome.alignment);
            tallies.count(outcome);
        }

        let mut outcomes = outcomes;
        outcomes.sort_by(|a, b| {
            a.rank_score().cmp(&b.rank_score()).then_with(|| {
                b.alignment
                    .counts
                    .error_rate()
                    .total_cmp(&a.alignment.counts.error_rate())
            })
        });

        Report {
            stats,
            tallies,
            outcomes,
        }
    }

    /// The headline accuracy line.
    pub fn overall_line(&self) -> String {
        let o = self.stats.overall();
        format!(
            "Overall -> {:.2} % +/- {:.2} % N={} C={} S={} D={} I={}",
            self.stats.word_error_rate(),
            self.stats.margin_of_error(DEFAULT_CONFIDENCE_Z),
            o.all,
            o.correct,
            o.substitution,
            o.deletion,
            o.insertion
        )
    }

    /// Render the full text report: overall accuracy, command tallies,
    /// the worst-token ranking, and one block per utterance (worst first).
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.overall_line());
        let _ = writeln!(out);

        let t = &self.tallies;
        let _ = writeln!(out, "cmds={}", t.cmds);
        let _ = writeln!(out, "cmd_not_correct_output={}", t.cmd_not_correct_output);
        let _ = writeln!(out, "cmd_not_correct_rule={}", t.cmd_not_correct_rule);
        let _ = writeln!(out, "cmd_not_correct_options={}", t.cmd_not_correct_options);
        let _ = writeln!(out, "cmd_not_recog_output={}", t.cmd_not_recog_output);
        let _ = writeln!(out, "cmd_not_recog_input={}", t.cmd_not_recog_input);

        if !self.stats.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "token stats:");
            for (token, c) in self.stats.tokens() {
                let _ = writeln!(out, "{}", token_line(token, c));
            }

            let _ = writeln!(out);
            let _ = writeln!(out, "tokens ranked worst first:");
            for (token, c) in self.stats.ranked_tokens() {
                let _ = writeln!(out, "{}", token_line(token, c));
            }
        }

        for outcome in &self.outcomes {
            let _ = writeln!(out);
            let _ = writeln!(out, "utt: {}", outcome.audio_path.display());
            let c = outcome.alignment.counts;
            let _ = writeln!(
                out,
                "WER: {:.2} % N={} C={} S={} D={} I={}",
                c.error_rate() * 100.0,
                c.all,
                c.correct,
                c.substitution,
                c.deletion,
                c.insertion
            );
            let (ref_row, hyp_row) = aligned_rows(outcome);
            let _ = writeln!(out, "ref: {ref_row}");
            let _ = writeln!(out, "hyp: {hyp_row}");
            let _ = writeln!(
                out,
                "rule: {} options: {} overall: {}",
                verdict_word(outcome.rule_match),
                verdict_word(outcome.options_match),
                verdict_word(outcome.overall_correctness)
            );
            if let Some(decoded) = &outcome.decoded {
                let _ = writeln!(out, "fired: {}", interpretation_line(decoded));
            }
            if let Some(mimicked) = &outcome.mimicked {
                let _ = writeln!(out, "expected: {}", interpretation_line(mimicked));
            }
        }

        out
    }
}

fn token_line(token: &str, c: &crate::stats::TokenCounts) -> String {
    format!(
        "{:.2} % {} N={} C={} S={} D={} I={}",
        c.error_rate() * 100.0,
        token,
        c.all,
        c.correct,
        c.substitution,
        c.deletion,
        c.insertion
    )
}

fn verdict_word(v: Verdict) -> &'static str {
    match v {
        Verdict::Correct => "correct",
        Verdict::Incorrect => "incorrect",
        Verdict::Unknown => "unknown",
    }
}

fn interpretation_line(interp: &crate::decoder::Interpretation) -> String {
    if interp.options.is_empty() {
        return interp.rule.clone();
    }
    let options: Vec<String> = interp
        .options
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    format!("{} [{}]", interp.rule, options.join(", "))
}

/// Column-aligned reference and hypothesis rows. A token missing on one
/// side is shown as asterisks matching its counterpart's width.
fn aligned_rows(outcome: &UtteranceOutcome) -> (String, String) {
    let mut ref_row = Vec::new();
    let mut hyp_row = Vec::new();
    for (r, h) in outcome
        .alignment
        .aligned_reference
        .iter()
        .zip(&outcome.alignment.aligned_hypothesis)
    {
        let width = r.len().max(h.len());
        let fill = |t: &str| {
            if t.is_empty() {
                "*".repeat(width)
            } else {
                format!("{t:<width$}")
            }
        };
        ref_row.push(fill(r));
        hyp_row.push(fill(h));
    }
    (ref_row.join(" "), hyp_row.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::score_transcripts;
    use crate::decoder::Interpretation;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn outcome(
        name: &str,
        reference: &str,
        hypothesis: &str,
        decoded_rule: Option<&str>,
        mimicked_rule: Option<&str>,
    ) -> UtteranceOutcome {
        let decoded = decoded_rule.map(|r| Interpretation {
            rule: r.to_string(),
            options: BTreeMap::new(),
        });
        let mimicked = mimicked_rule.map(|r| Interpretation {
            rule: r.to_string(),
            options: BTreeMap::new(),
        });
        let (rule_match, options_match, overall_correctness) =
            crate::evaluate::classify(decoded.as_ref(), mimicked.as_ref());
        UtteranceOutcome {
            audio_path: PathBuf::from(format!("{name}.wav")),
            reference: reference.to_string(),
            hypothesis: hypothesis.to_string(),
            decoded,
            mimicked,
            rule_match,
            options_match,
            overall_correctness,
            alignment: score_transcripts(reference, hypothesis),
        }
    }

    #[test]
    fn tallies_cover_every_category() {
        let report = Report::build(vec![
            outcome("good", "fall back", "fall back", Some("FallBack"), Some("FallBack")),
            outcome("wrong_rule", "fall back", "hold", Some("Hold"), Some("FallBack")),
            outcome("no_audio_recog", "fall back", "", None, Some("FallBack")),
            outcome("bad_transcript", "xyzzy", "fall back", Some("FallBack"), None),
        ]);
        let t = report.tallies;
        assert_eq!(t.cmds, 4);
        assert_eq!(t.cmd_not_correct_rule, 1);
        assert_eq!(t.cmd_not_correct_output, 1);
        assert_eq!(t.cmd_not_correct_options, 0);
        assert_eq!(t.cmd_not_recog_output, 1);
        assert_eq!(t.cmd_not_recog_input, 1);
    }

    #[test]
    fn outcomes_sort_worst_first_with_wer_tiebreak() {
        let report = Report::build(vec![
            outcome("clean", "go go go", "go go go", Some("Go"), Some("Go")),
            // Same rank score as "bad_wer" (both fully incorrect) but a
            // lower token error rate, so it sorts after it.
            outcome("bad", "fall back now", "fall black now", Some("X"), Some("FallBack")),
            outcome("bad_wer", "fall back", "hold it", Some("Y"), Some("FallBack")),
        ]);
        let names: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| o.audio_path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["bad_wer.wav", "bad.wav", "clean.wav"]);
    }

    #[test]
    fn overall_line_format() {
        let report = Report::build(vec![outcome(
            "one",
            "hold the door",
            "hold door",
            Some("Hold"),
            Some("Hold"),
        )]);
        let line = report.overall_line();
        assert!(line.starts_with("Overall -> 33.33 % +/- "), "{line}");
        assert!(line.ends_with("N=3 C=2 S=0 D=1 I=0"), "{line}");
    }

    #[test]
    fn render_includes_padded_alignment() {
        let report = Report::build(vec![outcome(
            "one",
            "team breach and clear",
            "team breach clear",
            Some("BreachAndClear"),
            Some("BreachAndClear"),
        )]);
        let text = report.render();
        assert!(text.contains("utt: one.wav"));
        // The deleted "and" shows as asterisks in the hypothesis row.
        assert!(text.contains("ref: team breach and clear"));
        assert!(text.contains("hyp: team breach *** clear"));
        assert!(text.contains("rule: correct options: correct overall: correct"));
        assert!(text.contains("token stats:"));
        assert!(text.contains("tokens ranked worst first:"));
        // "and" carries the only error, so it leads the ranking.
        let ranking = text.split("tokens ranked worst first:").nth(1).unwrap();
        assert!(ranking.trim_start().starts_with("100.00 % and"));
    }

    #[test]
    fn render_empty_report() {
        let report = Report::build(Vec::new());
        let text = report.render();
        assert!(text.contains("cmds=0"));
        assert!(text.contains("N=0"));
    }
}
