//! Cumulative alignment statistics: overall WER, confidence interval, and
//! per-token error rankings across many aligned utterances.

use std::collections::HashMap;

use crate::align::{AlignmentCounts, AlignmentResult};

/// Default z for the 95% confidence interval.
pub const DEFAULT_CONFIDENCE_Z: f64 = 1.96;

/// Per-token classification counts.
///
/// Correct/substituted/deleted classifications are attributed to the
/// reference token; insertions are attributed to the hypothesis token,
/// since an inserted token has no reference counterpart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCounts {
    pub all: usize,
    pub correct: usize,
    pub substitution: usize,
    pub deletion: usize,
    pub insertion: usize,
}

impl TokenCounts {
    pub fn errors(&self) -> usize {
        self.substitution + self.deletion + self.insertion
    }

    pub fn error_rate(&self) -> f64 {
        self.errors() as f64 / self.all.max(1) as f64
    }

    fn add(&mut self, other: &TokenCounts) {
        self.all += other.all;
        self.correct += other.correct;
        self.substitution += other.substitution;
        self.deletion += other.deletion;
        self.insertion += other.insertion;
    }
}

/// Accumulates alignment classifications across a run.
///
/// Token entries are created lazily on first observation and never
/// removed; their first-seen order is remembered so that ranking ties
/// resolve deterministically.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    index: HashMap<String, usize>,
    entries: Vec<(String, TokenCounts)>,
    overall: AlignmentCounts,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, token: &str) -> &mut TokenCounts {
        let idx = match self.index.get(token) {
            Some(&idx) => idx,
            None => {
                let idx = self.entries.len();
                self.entries.push((token.to_string(), TokenCounts::default()));
                self.index.insert(token.to_string(), idx);
                idx
            }
        };
        &mut self.entries[idx].1
    }

    /// Fold one utterance alignment into the cumulative counts.
    pub fn record(&mut self, alignment: &AlignmentResult) {
        self.overall.all += alignment.counts.all;
        self.overall.correct += alignment.counts.correct;
        self.overall.substitution += alignment.counts.substitution;
        self.overall.deletion += alignment.counts.deletion;
        self.overall.insertion += alignment.counts.insertion;

        for (r, h) in alignment
            .aligned_reference
            .iter()
            .zip(&alignment.aligned_hypothesis)
        {
            match (r.is_empty(), h.is_empty()) {
                (false, false) if r == h => {
                    let counts = self.entry(r);
                    counts.all += 1;
                    counts.correct += 1;
                }
                (false, false) => {
                    let counts = self.entry(r);
                    counts.all += 1;
                    counts.substitution += 1;
                }
                (false, true) => {
                    let counts = self.entry(r);
                    counts.all += 1;
                    counts.deletion += 1;
                }
                (true, false) => {
                    self.entry(h).insertion += 1;
                }
                (true, true) => {}
            }
        }
    }

    /// Overall counts across every recorded alignment.
    pub fn overall(&self) -> AlignmentCounts {
        self.overall
    }

    /// Word error rate as a percentage.
    ///
    /// Defined as 0 when no reference tokens have been seen, even if
    /// insertions occurred; the insertion count in the report makes that
    /// case visible.
    pub fn word_error_rate(&self) -> f64 {
        if self.overall.all == 0 {
            return 0.0;
        }
        self.overall.errors() as f64 * 100.0 / self.overall.all as f64
    }

    /// Half-width of the normal-approximation confidence interval for the
    /// WER proportion, as a percentage. `NaN` when no tokens were seen.
    pub fn margin_of_error(&self, z: f64) -> f64 {
        let n = self.overall.all;
        if n == 0 {
            return f64::NAN;
        }
        let p = self.word_error_rate().clamp(0.0, 100.0) / 100.0;
        z * (p * (1.0 - p) / n as f64).sqrt() * 100.0
    }

    /// Tokens in first-seen order, with their counts.
    pub fn tokens(&self) -> impl Iterator<Item = (&str, &TokenCounts)> {
        self.entries.iter().map(|(t, c)| (t.as_str(), c))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tokens sorted worst-to-best by error rate. The sort is stable, so
    /// tokens with identical rates keep their first-seen order.
    pub fn ranked_tokens(&self) -> Vec<(&str, &TokenCounts)> {
        let mut ranked: Vec<_> = self.tokens().collect();
        ranked.sort_by(|a, b| b.1.error_rate().total_cmp(&a.1.error_rate()));
        ranked
    }

    /// Combine another accumulator into this one by summing counts.
    /// Summation makes the merge commutative and associative, so the
    /// order workers are merged in never changes the totals.
    pub fn merge(&mut self, other: &StatsAccumulator) {
        self.overall.all += other.overall.all;
        self.overall.correct += other.overall.correct;
        self.overall.substitution += other.overall.substitution;
        self.overall.deletion += other.overall.deletion;
        self.overall.insertion += other.overall.insertion;
        for (token, counts) in other.tokens() {
            self.entry(token).add(counts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::score_transcripts;

    fn accumulate(pairs: &[(&str, &str)]) -> StatsAccumulator {
        let mut stats = StatsAccumulator::new();
        for (r, h) in pairs {
            stats.record(&score_transcripts(r, h));
        }
        stats
    }

    #[test]
    fn wer_round_trip() {
        // all=10, correct=7, substitution=2, deletion=1, insertion=0
        let stats = accumulate(&[("a b c d e f g h i j", "a b c d e f g x y")]);
        let o = stats.overall();
        assert_eq!(o.all, 10);
        assert_eq!(o.correct, 7);
        assert_eq!(o.substitution, 2);
        assert_eq!(o.deletion, 1);
        assert_eq!(o.insertion, 0);
        assert_eq!(stats.word_error_rate(), 30.0);
    }

    #[test]
    fn wer_zero_when_nothing_recorded() {
        let stats = StatsAccumulator::new();
        assert_eq!(stats.word_error_rate(), 0.0);
    }

    #[test]
    fn wer_zero_on_insertion_only_run() {
        // Empty reference against a hypothesis: an insertion occurred but
        // the denominator is empty, so WER stays 0 by policy.
        let stats = accumulate(&[("", "hello")]);
        assert_eq!(stats.overall().insertion, 1);
        assert_eq!(stats.overall().all, 0);
        assert_eq!(stats.word_error_rate(), 0.0);
    }

    #[test]
    fn margin_of_error_is_nan_at_zero_n() {
        let stats = StatsAccumulator::new();
        assert!(stats.margin_of_error(DEFAULT_CONFIDENCE_Z).is_nan());
    }

    #[test]
    fn margin_of_error_matches_normal_approximation() {
        let stats = accumulate(&[("a b c d e f g h i j", "a b c d e f g x y")]);
        // p = 0.3, n = 10
        let expected = 1.96 * (0.3f64 * 0.7 / 10.0).sqrt() * 100.0;
        let moe = stats.margin_of_error(DEFAULT_CONFIDENCE_Z);
        assert!((moe - expected).abs() < 1e-9);
    }

    #[test]
    fn per_token_attribution() {
        let stats = accumulate(&[("breach and clear", "breach clear go")]);
        let tokens: std::collections::HashMap<_, _> = stats.tokens().collect();
        // "and" was deleted: attributed to the reference token.
        assert_eq!(tokens["and"].deletion, 1);
        assert_eq!(tokens["and"].all, 1);
        // "go" was inserted: attributed to the hypothesis token, no `all`.
        assert_eq!(tokens["go"].insertion, 1);
        assert_eq!(tokens["go"].all, 0);
        assert_eq!(tokens["breach"].correct, 1);
    }

    #[test]
    fn ranked_tokens_worst_first() {
        let stats = accumulate(&[
            ("alpha alpha alpha", "alpha alpha alpha"),
            ("bravo", "charlie"),
        ]);
        let ranked = stats.ranked_tokens();
        assert_eq!(ranked[0].0, "bravo");
        assert_eq!(ranked.last().unwrap().0, "alpha");
    }

    #[test]
    fn ranking_ties_keep_first_seen_order() {
        // Both tokens end up with a 100% error rate; "zulu" was seen first.
        let stats = accumulate(&[("zulu", "x"), ("yankee", "y")]);
        let ranked = stats.ranked_tokens();
        let rates: Vec<_> = ranked.iter().map(|(_, c)| c.error_rate()).collect();
        assert_eq!(rates[0], rates[1]);
        let names: Vec<_> = ranked
            .iter()
            .filter(|(t, _)| *t == "zulu" || *t == "yankee")
            .map(|(t, _)| *t)
            .collect();
        assert_eq!(names, ["zulu", "yankee"]);
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let mut stats = accumulate(&[("hold the door", "hold door")]);
        let before = stats.overall();
        stats.merge(&StatsAccumulator::new());
        assert_eq!(stats.overall(), before);
    }

    #[test]
    fn merge_is_commutative() {
        let a = accumulate(&[("alpha bravo", "alpha charlie")]);
        let b = accumulate(&[("bravo bravo", "bravo")]);

        let mut ab = accumulate(&[("alpha bravo", "alpha charlie")]);
        ab.merge(&b);
        let mut ba = accumulate(&[("bravo bravo", "bravo")]);
        ba.merge(&a);

        assert_eq!(ab.overall(), ba.overall());
        let ab_tokens: std::collections::HashMap<_, _> = ab.tokens().collect();
        let ba_tokens: std::collections::HashMap<_, _> = ba.tokens().collect();
        assert_eq!(ab_tokens, ba_tokens);
    }

    #[test]
    fn merge_is_associative() {
        let sets: [&[(&str, &str)]; 3] = [
            &[("alpha bravo", "alpha charlie")],
            &[("bravo bravo", "bravo")],
            &[("delta", "delta echo")],
        ];
        let make = |i: usize| accumulate(sets[i]);

        // (A + B) + C
        let mut left = make(0);
        left.merge(&make(1));
        left.merge(&make(2));
        // A + (B + C)
        let mut bc = make(1);
        bc.merge(&make(2));
        let mut right = make(0);
        right.merge(&bc);

        assert_eq!(left.overall(), right.overall());
        let l: std::collections::HashMap<_, _> = left.tokens().collect();
        let r: std::collections::HashMap<_, _> = right.tokens().collect();
        assert_eq!(l, r);
    }
}
