//! Per-utterance evaluation: two decode passes and correctness
//! classification of the structured interpretations they produced.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::align::{Aligner, AlignmentResult, tokenize};
use crate::audio::read_wav_pcm;
use crate::dataset::DatasetRecord;
use crate::decoder::{Decoder, DecoderError, Interpretation, Recognition};

/// Default number of polling retries while waiting on a decode pass.
pub const DEFAULT_POLL_RETRIES: u32 = 30;
/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Three-valued correctness flag: correct, incorrect, or not
/// applicable/unknown (e.g. one of the passes produced no rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
    Unknown,
}

impl Verdict {
    /// Numeric form used in reports and ranking: 1, -1, or 0.
    pub fn as_i8(self) -> i8 {
        match self {
            Verdict::Correct => 1,
            Verdict::Incorrect => -1,
            Verdict::Unknown => 0,
        }
    }
}

/// Everything learned about one (audio, reference) pair. Immutable once
/// returned; the orchestrator owns it for the lifetime of the report.
#[derive(Debug, Clone)]
pub struct UtteranceOutcome {
    pub audio_path: PathBuf,
    pub reference: String,
    pub hypothesis: String,
    /// Interpretation from the live audio pass, if a rule fired.
    pub decoded: Option<Interpretation>,
    /// Interpretation from the text-replay pass; the ground truth for
    /// what the grammar should have produced.
    pub mimicked: Option<Interpretation>,
    pub rule_match: Verdict,
    pub options_match: Verdict,
    pub overall_correctness: Verdict,
    pub alignment: AlignmentResult,
}

impl UtteranceOutcome {
    /// Composite ranking score; incorrect outcomes sort first
    /// (ascending), so the worst utterances lead the report.
    pub fn rank_score(&self) -> i32 {
        100 * self.overall_correctness.as_i8() as i32
            + 10 * self.rule_match.as_i8() as i32
            + self.options_match.as_i8() as i32
    }
}

/// Errors that abort an utterance evaluation. These are infrastructure
/// failures; "no recognition" is a content outcome and never lands here.
#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error("decoder failure: {0}")]
    Decoder(#[from] DecoderError),

    #[error("failed to read audio {path}: {source}")]
    Audio {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}

/// Runs both decode passes for one utterance and classifies the result.
/// One evaluator per worker; it owns the worker's aligner scratch state.
pub struct UtteranceEvaluator {
    aligner: Aligner,
    poll_retries: u32,
    poll_interval: Duration,
}

impl Default for UtteranceEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_RETRIES, DEFAULT_POLL_INTERVAL)
    }
}

impl UtteranceEvaluator {
    pub fn new(poll_retries: u32, poll_interval: Duration) -> Self {
        Self {
            aligner: Aligner::new(),
            poll_retries,
            poll_interval,
        }
    }

    /// Evaluate one dataset record against a decoder.
    ///
    /// The audio pass feeds the recorded WAV through acoustic decoding;
    /// the replay pass mimics the literal reference text to obtain the
    /// rule and options the grammar would produce for a perfect
    /// transcript. Either pass may time out, which is recorded as "no
    /// recognition" rather than an error.
    pub fn evaluate(
        &mut self,
        decoder: &mut dyn Decoder,
        record: &DatasetRecord,
    ) -> Result<UtteranceOutcome, EvaluateError> {
        let pcm = read_wav_pcm(&record.audio_path).map_err(|source| EvaluateError::Audio {
            path: record.audio_path.clone(),
            source,
        })?;

        let decoded = self.wait(decoder.decode(&pcm)?);
        let mimicked = self.wait(decoder.mimic(&record.reference)?);

        let hypothesis = decoded.words.join(" ");
        tracing::debug!(
            "ref: {} | hyp: {} | rule: {:?}",
            record.reference,
            hypothesis,
            decoded.interpretation.as_ref().map(|i| &i.rule)
        );

        let alignment = self
            .aligner
            .align(&tokenize(&record.reference), &tokenize(&hypothesis));

        let (rule_match, options_match, overall_correctness) = classify(
            decoded.interpretation.as_ref(),
            mimicked.interpretation.as_ref(),
        );

        Ok(UtteranceOutcome {
            audio_path: record.audio_path.clone(),
            reference: record.reference.clone(),
            hypothesis,
            decoded: decoded.interpretation,
            mimicked: mimicked.interpretation,
            rule_match,
            options_match,
            overall_correctness,
            alignment,
        })
    }

    /// Bounded wait on a pass's result channel. An exhausted retry budget
    /// or a sender dropped without a result both mean "no recognition".
    fn wait(&self, rx: Receiver<Recognition>) -> Recognition {
        for _ in 0..self.poll_retries {
            match rx.recv_timeout(self.poll_interval) {
                Ok(recognition) => return recognition,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::debug!("decode pass produced no recognition");
        Recognition::default()
    }
}

/// Classify agreement between the audio-pass and replay-pass
/// interpretations.
///
/// `options_match` is only judged when the rules agree; every slot value
/// the replay pass bound must equal the audio pass's value for it.
pub fn classify(
    decoded: Option<&Interpretation>,
    mimicked: Option<&Interpretation>,
) -> (Verdict, Verdict, Verdict) {
    let rule_match = match (decoded, mimicked) {
        (Some(d), Some(m)) if d.rule == m.rule => Verdict::Correct,
        (Some(_), Some(_)) => Verdict::Incorrect,
        _ => Verdict::Unknown,
    };

    let options_match = match (rule_match, decoded, mimicked) {
        (Verdict::Correct, Some(d), Some(m)) => {
            let all_match = m
                .options
                .iter()
                .all(|(name, value)| d.options.get(name) == Some(value));
            if all_match {
                Verdict::Correct
            } else {
                Verdict::Incorrect
            }
        }
        _ => Verdict::Unknown,
    };

    let overall = if rule_match == Verdict::Incorrect || options_match == Verdict::Incorrect {
        Verdict::Incorrect
    } else if rule_match == Verdict::Correct && options_match == Verdict::Correct {
        Verdict::Correct
    } else {
        Verdict::Unknown
    };

    (rule_match, options_match, overall)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::mpsc;

    fn interp(rule: &str, options: &[(&str, &str)]) -> Interpretation {
        Interpretation {
            rule: rule.to_string(),
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn matching_rule_and_options_is_correct() {
        let d = interp("BreachAndClear", &[("color", "blue")]);
        let m = interp("BreachAndClear", &[("color", "blue")]);
        let (rule, options, overall) = classify(Some(&d), Some(&m));
        assert_eq!(rule, Verdict::Correct);
        assert_eq!(options, Verdict::Correct);
        assert_eq!(overall, Verdict::Correct);
    }

    #[test]
    fn same_rule_different_option_value() {
        let d = interp("BreachAndClear", &[("color", "blue")]);
        let m = interp("BreachAndClear", &[("color", "red")]);
        let (rule, options, overall) = classify(Some(&d), Some(&m));
        assert_eq!(rule.as_i8(), 1);
        assert_eq!(options.as_i8(), -1);
        assert_eq!(overall.as_i8(), -1);
    }

    #[test]
    fn different_rules_are_incorrect() {
        let d = interp("FallBack", &[]);
        let m = interp("BreachAndClear", &[]);
        let (rule, options, overall) = classify(Some(&d), Some(&m));
        assert_eq!(rule, Verdict::Incorrect);
        assert_eq!(options, Verdict::Unknown);
        assert_eq!(overall, Verdict::Incorrect);
    }

    #[test]
    fn missing_pass_is_unknown() {
        let m = interp("BreachAndClear", &[]);
        let (rule, options, overall) = classify(None, Some(&m));
        assert_eq!(rule, Verdict::Unknown);
        assert_eq!(options, Verdict::Unknown);
        assert_eq!(overall, Verdict::Unknown);

        let (rule, _, overall) = classify(None, None);
        assert_eq!(rule, Verdict::Unknown);
        assert_eq!(overall, Verdict::Unknown);
    }

    #[test]
    fn extra_audio_side_options_do_not_fail_the_match() {
        // Only the replay-pass bindings define what must be present.
        let d = interp("Move", &[("direction", "left"), ("speed", "fast")]);
        let m = interp("Move", &[("direction", "left")]);
        let (_, options, overall) = classify(Some(&d), Some(&m));
        assert_eq!(options, Verdict::Correct);
        assert_eq!(overall, Verdict::Correct);
    }

    #[test]
    fn missing_audio_side_option_fails_the_match() {
        let d = interp("Move", &[]);
        let m = interp("Move", &[("direction", "left")]);
        let (_, options, overall) = classify(Some(&d), Some(&m));
        assert_eq!(options, Verdict::Incorrect);
        assert_eq!(overall, Verdict::Incorrect);
    }

    #[test]
    fn wait_returns_result_when_sent() {
        let evaluator = UtteranceEvaluator::new(3, Duration::from_millis(10));
        let (tx, rx) = mpsc::channel();
        tx.send(Recognition {
            words: vec!["hold".to_string()],
            interpretation: None,
        })
        .unwrap();
        let got = evaluator.wait(rx);
        assert_eq!(got.words, ["hold"]);
    }

    #[test]
    fn wait_treats_dropped_sender_as_no_recognition() {
        let evaluator = UtteranceEvaluator::new(3, Duration::from_millis(10));
        let (tx, rx) = mpsc::channel::<Recognition>();
        drop(tx);
        assert_eq!(evaluator.wait(rx), Recognition::default());
    }

    #[test]
    fn wait_times_out_to_no_recognition() {
        let evaluator = UtteranceEvaluator::new(2, Duration::from_millis(5));
        // Sender kept alive but never sends.
        let (tx, rx) = mpsc::channel::<Recognition>();
        let got = evaluator.wait(rx);
        drop(tx);
        assert_eq!(got, Recognition::default());
    }
}
