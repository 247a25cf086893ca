//! Subprocess decoder bridge.
//!
//! The recognizer runs as a child process speaking a JSON-lines protocol
//! on stdin/stdout: one request line in, one response line out, in order.
//! Audio is base64-encoded on the wire. The child prints a ready line
//! once its model is loaded; anything else at startup is fatal.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::decoder::{Decoder, DecoderError, DecoderFactory, Interpretation, Recognition};

/// How long shutdown waits for the child to exit before killing it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum WireRequest<'a> {
    Decode { audio_b64: String },
    Mimic { text: &'a str },
    Shutdown,
}

#[derive(Deserialize)]
struct WireReady {
    ready: bool,
}

#[derive(Deserialize)]
struct WireResponse {
    recognized: bool,
    #[serde(default)]
    words: Vec<String>,
    #[serde(default)]
    interpretation: Option<Interpretation>,
}

/// Starts one decoder child process per worker.
pub struct SubprocessDecoderFactory {
    command: Vec<String>,
    model_dir: Option<PathBuf>,
}

impl SubprocessDecoderFactory {
    pub fn new(command: Vec<String>, model_dir: Option<PathBuf>) -> Self {
        Self { command, model_dir }
    }
}

impl DecoderFactory for SubprocessDecoderFactory {
    fn initialize(&self) -> Result<Box<dyn Decoder>, DecoderError> {
        let decoder = SubprocessDecoder::spawn(&self.command, self.model_dir.as_deref())?;
        Ok(Box::new(decoder))
    }
}

/// One live decoder child, exclusively owned by a worker.
///
/// A single reader thread owns the child's stdout for the handle's
/// lifetime and pairs each response line with the oldest pending request
/// sender, so pairing follows request order even when a caller stopped
/// waiting before its response arrived.
pub struct SubprocessDecoder {
    child: Child,
    stdin: ChildStdin,
    pending: Arc<Mutex<VecDeque<Sender<Recognition>>>>,
    reader: Option<JoinHandle<()>>,
    shutdown_grace: Duration,
}

impl SubprocessDecoder {
    pub fn spawn(
        command: &[String],
        model_dir: Option<&std::path::Path>,
    ) -> Result<Self, DecoderError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| DecoderError::Protocol("empty decoder command".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped());
        if let Some(dir) = model_dir {
            cmd.arg("--model-dir").arg(dir);
        }
        tracing::debug!("spawning decoder: {program}");
        let mut child = cmd.spawn().map_err(DecoderError::Spawn)?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let mut reader = BufReader::new(stdout);

        // Model load happens before the ready line; block until it lands.
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .map_err(|e| DecoderError::ModelLoad(e.to_string()))?;
        if line.is_empty() {
            return Err(DecoderError::ModelLoad(
                "decoder exited before signalling ready".to_string(),
            ));
        }
        let ready: WireReady = serde_json::from_str(&line)
            .map_err(|e| DecoderError::ModelLoad(format!("bad ready line: {e}")))?;
        if !ready.ready {
            return Err(DecoderError::ModelLoad(
                "decoder reported not ready".to_string(),
            ));
        }
        tracing::info!("decoder ready");

        let pending: Arc<Mutex<VecDeque<Sender<Recognition>>>> =
            Arc::new(Mutex::new(VecDeque::new()));
        let queue = Arc::clone(&pending);
        let handle = std::thread::spawn(move || {
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let tx = match queue.lock() {
                    Ok(mut q) => q.pop_front(),
                    Err(_) => break,
                };
                let Some(tx) = tx else {
                    tracing::warn!("decoder sent an unsolicited response");
                    continue;
                };
                match serde_json::from_str::<WireResponse>(&line) {
                    Ok(response) if response.recognized => {
                        // A caller that stopped waiting has dropped its
                        // receiver; the late result is discarded here.
                        let _ = tx.send(Recognition {
                            words: response.words,
                            interpretation: response.interpretation,
                        });
                    }
                    Ok(_) => {} // explicit no-recognition
                    Err(e) => tracing::warn!("malformed decoder response: {e}"),
                }
            }
            // Child output closed: every outstanding pass reads as no
            // recognition once its sender drops.
            if let Ok(mut q) = queue.lock() {
                q.clear();
            }
        });

        Ok(Self {
            child,
            stdin,
            pending,
            reader: Some(handle),
            shutdown_grace: SHUTDOWN_GRACE,
        })
    }

    /// Write one request line; a broken pipe means the child died.
    fn send(&mut self, request: &WireRequest) -> Result<(), DecoderError> {
        let mut line =
            serde_json::to_string(request).map_err(|e| DecoderError::Protocol(e.to_string()))?;
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .and_then(|()| self.stdin.flush())
            .map_err(|e| DecoderError::Disconnected(e.to_string()))
    }

    /// Enqueue a result sender, then write the request. The sender must be
    /// queued first so the reader can never see a response without a
    /// pending sender for it.
    fn request(&mut self, request: &WireRequest) -> Result<Receiver<Recognition>, DecoderError> {
        let (tx, rx) = mpsc::channel();
        self.pending
            .lock()
            .map_err(|_| DecoderError::Protocol("decoder reader thread panicked".to_string()))?
            .push_back(tx);
        if let Err(e) = self.send(request) {
            // Requests are serialized per handle, so the failed request's
            // sender is still at the back.
            if let Ok(mut q) = self.pending.lock() {
                q.pop_back();
            }
            return Err(e);
        }
        Ok(rx)
    }
}

impl Decoder for SubprocessDecoder {
    fn decode(&mut self, audio: &[u8]) -> Result<Receiver<Recognition>, DecoderError> {
        self.request(&WireRequest::Decode {
            audio_b64: BASE64.encode(audio),
        })
    }

    fn mimic(&mut self, text: &str) -> Result<Receiver<Recognition>, DecoderError> {
        self.request(&WireRequest::Mimic { text })
    }

    fn shutdown(&mut self) -> Result<(), DecoderError> {
        // The child may already be gone; a failed write just means there
        // is nothing left to stop.
        let _ = self.send(&WireRequest::Shutdown);

        let deadline = Instant::now() + self.shutdown_grace;
        let status = loop {
            match self.child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                Ok(None) => break None,
                Err(e) => return Err(DecoderError::Disconnected(e.to_string())),
            }
        };

        let result = match status {
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(DecoderError::Disconnected(format!(
                "decoder exited with {status}"
            ))),
            None => {
                tracing::warn!("decoder ignored shutdown request; killing it");
                let _ = self.child.kill();
                let _ = self.child.wait();
                Err(DecoderError::Disconnected(
                    "decoder ignored shutdown request".to_string(),
                ))
            }
        };

        // The child is gone either way, so its stdout is closed and the
        // reader thread is on its way out.
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        result
    }
}

impl Drop for SubprocessDecoder {
    fn drop(&mut self) {
        // Last resort if shutdown was never called.
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
