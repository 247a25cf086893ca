//! The decoder collaborator boundary.
//!
//! The evaluation engine never talks to a recognizer directly; it goes
//! through [`Decoder`], which hands back a per-call result channel for
//! each decode or mimic request. Workers get their own decoder handle
//! from a [`DecoderFactory`] exactly once, since loading recognizer model
//! state is expensive and the handle is not shareable.

use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;

use serde::{Deserialize, Serialize};

/// The structured interpretation of a recognized command: which grammar
/// rule fired and the named slot values it bound (e.g. `color = "blue"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpretation {
    pub rule: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// One recognition result: the hypothesis token sequence plus the
/// interpretation, or `None` when no grammar rule fired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recognition {
    pub words: Vec<String>,
    pub interpretation: Option<Interpretation>,
}

/// Fatal decoder infrastructure failures. Content-level outcomes (no
/// recognition, timeout) are never represented here; they surface as an
/// empty [`Recognition`] instead.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("failed to start decoder process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("decoder disconnected: {0}")]
    Disconnected(String),

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("malformed decoder response: {0}")]
    Protocol(String),
}

/// A live recognizer session, exclusively owned by one worker.
///
/// `decode` and `mimic` return immediately with a channel the caller
/// polls; a sender dropped without a value means the pass produced no
/// recognition. Errors from these methods are always fatal.
pub trait Decoder: Send {
    /// Submit recorded audio (raw PCM frames) for acoustic decoding.
    fn decode(&mut self, audio: &[u8]) -> Result<Receiver<Recognition>, DecoderError>;

    /// Inject literal text into the grammar matcher, bypassing acoustic
    /// decoding. This yields the rule and bindings a perfect transcript
    /// would produce.
    fn mimic(&mut self, text: &str) -> Result<Receiver<Recognition>, DecoderError>;

    /// Release decoder resources. Called exactly once at worker teardown.
    fn shutdown(&mut self) -> Result<(), DecoderError>;
}

/// Builds one decoder handle per worker. `initialize` is expensive and
/// may trigger model (re)compilation, so the orchestrator calls it once
/// serially before starting the pool.
pub trait DecoderFactory: Sync {
    fn initialize(&self) -> Result<Box<dyn Decoder>, DecoderError>;
}
