//! Token-sequence alignment via Levenshtein dynamic programming.
//!
//! The aligner classifies every reference/hypothesis token as correct,
//! substituted, deleted, or inserted, which is the input both for WER and
//! for per-token error statistics.

/// Edit operation chosen for a cell of the DP grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Correct,
    Substitute,
    Delete,
    Insert,
    /// Only valid at (0,0); terminates the backtrace.
    Start,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    dist: usize,
    op: Op,
}

/// Classification counts for one alignment.
///
/// `all` is the reference-token count credited to the alignment
/// (`correct + substitution + deletion`); insertions have no reference
/// token and never contribute to `all`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignmentCounts {
    pub all: usize,
    pub correct: usize,
    pub substitution: usize,
    pub deletion: usize,
    pub insertion: usize,
}

impl AlignmentCounts {
    pub fn errors(&self) -> usize {
        self.substitution + self.deletion + self.insertion
    }

    /// Error rate over the reference length, in [0, ..], as a fraction.
    /// Guards against the empty-reference case.
    pub fn error_rate(&self) -> f64 {
        self.errors() as f64 / self.all.max(1) as f64
    }
}

/// One scored alignment: parallel token sequences padded with empty-string
/// placeholders (deletion leaves the hypothesis side empty, insertion the
/// reference side), plus the classification counts.
#[derive(Debug, Clone, Default)]
pub struct AlignmentResult {
    pub aligned_reference: Vec<String>,
    pub aligned_hypothesis: Vec<String>,
    pub counts: AlignmentCounts,
}

/// Levenshtein aligner with a reusable scratch grid.
///
/// The grid is resized and fully overwritten on every call, so an `Aligner`
/// can be reused across utterances without clearing it between calls.
pub struct Aligner {
    grid: Vec<Cell>,
    cols: usize,
}

impl Default for Aligner {
    fn default() -> Self {
        Self::new()
    }
}

impl Aligner {
    pub fn new() -> Self {
        Self {
            grid: Vec::new(),
            cols: 0,
        }
    }

    fn at(&self, i: usize, j: usize) -> Cell {
        self.grid[i * self.cols + j]
    }

    /// Align `hypothesis` against `reference` with unit edit costs.
    ///
    /// On cost ties the operation preference is deletion, then insertion,
    /// then the diagonal (substitution/correct). This ordering is part of
    /// the contract: it decides which tokens get credited as errors on
    /// tied paths, and changing it would change reported rankings.
    pub fn align(&mut self, reference: &[&str], hypothesis: &[&str]) -> AlignmentResult {
        let rows = reference.len() + 1;
        let cols = hypothesis.len() + 1;
        self.cols = cols;
        self.grid.clear();
        self.grid.resize(
            rows * cols,
            Cell {
                dist: 0,
                op: Op::Start,
            },
        );

        for i in 1..rows {
            self.grid[i * cols] = Cell {
                dist: i,
                op: Op::Delete,
            };
        }
        for j in 1..cols {
            self.grid[j] = Cell {
                dist: j,
                op: Op::Insert,
            };
        }

        for i in 1..rows {
            for j in 1..cols {
                let mut best = Cell {
                    dist: usize::MAX,
                    op: Op::Start,
                };
                let del = self.at(i - 1, j).dist + 1;
                if del < best.dist {
                    best = Cell {
                        dist: del,
                        op: Op::Delete,
                    };
                }
                let ins = self.at(i, j - 1).dist + 1;
                if ins < best.dist {
                    best = Cell {
                        dist: ins,
                        op: Op::Insert,
                    };
                }
                let (diag, diag_op) = if reference[i - 1] == hypothesis[j - 1] {
                    (self.at(i - 1, j - 1).dist, Op::Correct)
                } else {
                    (self.at(i - 1, j - 1).dist + 1, Op::Substitute)
                };
                if diag < best.dist {
                    best = Cell {
                        dist: diag,
                        op: diag_op,
                    };
                }
                self.grid[i * cols + j] = best;
            }
        }

        self.backtrace(reference, hypothesis)
    }

    fn backtrace(&self, reference: &[&str], hypothesis: &[&str]) -> AlignmentResult {
        let mut result = AlignmentResult::default();
        let mut i = reference.len();
        let mut j = hypothesis.len();

        loop {
            match self.at(i, j).op {
                Op::Correct => {
                    result.counts.all += 1;
                    result.counts.correct += 1;
                    result.aligned_reference.push(reference[i - 1].to_string());
                    result.aligned_hypothesis.push(hypothesis[j - 1].to_string());
                    i -= 1;
                    j -= 1;
                }
                Op::Substitute => {
                    result.counts.all += 1;
                    result.counts.substitution += 1;
                    result.aligned_reference.push(reference[i - 1].to_string());
                    result.aligned_hypothesis.push(hypothesis[j - 1].to_string());
                    i -= 1;
                    j -= 1;
                }
                Op::Delete => {
                    result.counts.all += 1;
                    result.counts.deletion += 1;
                    result.aligned_reference.push(reference[i - 1].to_string());
                    result.aligned_hypothesis.push(String::new());
                    i -= 1;
                }
                Op::Insert => {
                    result.counts.insertion += 1;
                    result.aligned_reference.push(String::new());
                    result.aligned_hypothesis.push(hypothesis[j - 1].to_string());
                    j -= 1;
                }
                Op::Start => break,
            }
        }

        result.aligned_reference.reverse();
        result.aligned_hypothesis.reverse();
        result
    }
}

/// Split text into alignment tokens the way the dataset references are
/// tokenized: whitespace-separated words.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// One-shot convenience: align two transcripts without holding an `Aligner`.
pub fn score_transcripts(reference: &str, hypothesis: &str) -> AlignmentResult {
    Aligner::new().align(&tokenize(reference), &tokenize(hypothesis))
}
