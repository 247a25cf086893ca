//! Core evaluation engine for grammar-constrained speech recognition.
//!
//! Given a dataset of recorded utterances with reference transcripts,
//! gramscore measures two things about a recognizer:
//!
//! - **Transcript accuracy**: word error rate with a confidence interval,
//!   plus per-token error rankings, from Levenshtein alignment of every
//!   hypothesis against its reference ([`align`], [`stats`]).
//! - **Command accuracy**: whether the grammar rule and slot values the
//!   recognizer produced from audio match what the grammar produces from
//!   the reference text itself ([`evaluate`]).
//!
//! Batch runs fan out over a pool of workers, each owning its own decoder
//! handle ([`batch`]), and end in a worst-first text report ([`report`]).

pub mod align;
pub mod audio;
pub mod batch;
pub mod bridge;
pub mod config;
pub mod dataset;
pub mod decoder;
pub mod evaluate;
pub mod report;
pub mod stats;

pub use align::{score_transcripts, AlignmentCounts, AlignmentResult, Aligner};
pub use batch::{BatchError, BatchOptions, BatchOrchestrator};
pub use config::Config;
pub use dataset::{filter_records, read_dataset, read_lexicon, DatasetRecord};
pub use decoder::{Decoder, DecoderError, DecoderFactory, Interpretation, Recognition};
pub use evaluate::{UtteranceEvaluator, UtteranceOutcome, Verdict};
pub use report::{CommandTallies, Report};
pub use stats::StatsAccumulator;
