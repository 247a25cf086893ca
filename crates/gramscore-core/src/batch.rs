//! Batch evaluation: a fixed pool of workers, each owning its own decoder
//! handle, fed one utterance at a time in dataset order.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::time::Duration;

use crate::dataset::DatasetRecord;
use crate::decoder::{DecoderError, DecoderFactory};
use crate::evaluate::{EvaluateError, UtteranceEvaluator, UtteranceOutcome};
use crate::report::Report;

/// Pool and polling knobs for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub workers: usize,
    pub poll_retries: u32,
    pub poll_interval: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            poll_retries: crate::evaluate::DEFAULT_POLL_RETRIES,
            poll_interval: crate::evaluate::DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Failures that abort a batch run. No partial report survives any of
/// these; a silently shrunk sample would bias every reported statistic.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("decoder warm-up failed: {0}")]
    WarmUp(#[source] DecoderError),

    #[error("worker {worker} failed to initialize its decoder: {source}")]
    WorkerInit {
        worker: usize,
        #[source]
        source: DecoderError,
    },

    #[error("worker {worker} failed on {}: {source}", utterance.display())]
    Worker {
        worker: usize,
        utterance: PathBuf,
        #[source]
        source: EvaluateError,
    },

    #[error("evaluation interrupted")]
    Interrupted,
}

enum WorkerMessage {
    Done(usize, UtteranceOutcome),
    InitFailed {
        worker: usize,
        error: DecoderError,
    },
    Failed {
        worker: usize,
        utterance: PathBuf,
        error: EvaluateError,
    },
}

/// Distributes utterances across the worker pool and assembles the final
/// report once every worker has returned.
pub struct BatchOrchestrator<'a> {
    factory: &'a dyn DecoderFactory,
    options: BatchOptions,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(factory: &'a dyn DecoderFactory, options: BatchOptions) -> Self {
        Self { factory, options }
    }

    /// Run the batch. `cancel` is observed between utterances; once set,
    /// workers stop taking work and the run aborts with no report.
    pub fn run(
        &self,
        records: &[DatasetRecord],
        cancel: &AtomicBool,
    ) -> Result<Report, BatchError> {
        // Warm up serially before the pool starts: the first initialize
        // may trigger model (re)compilation, which must never run
        // concurrently in the workers.
        let mut warm = self.factory.initialize().map_err(BatchError::WarmUp)?;
        if let Err(e) = warm.shutdown() {
            tracing::warn!("warm-up decoder shutdown failed: {e}");
        }
        drop(warm);

        let workers = self.options.workers.max(1);
        tracing::info!(
            "evaluating {} utterances across {} worker(s)",
            records.len(),
            workers
        );

        let cursor = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<WorkerMessage>();

        let mut outcomes: Vec<Option<UtteranceOutcome>> = Vec::new();
        outcomes.resize_with(records.len(), || None);
        let mut first_error: Option<BatchError> = None;

        std::thread::scope(|scope| {
            for worker_id in 0..workers {
                let tx = tx.clone();
                let cursor = &cursor;
                scope.spawn(move || {
                    self.worker_loop(worker_id, records, cursor, cancel, tx);
                });
            }
            drop(tx);

            // Collect until every sender is gone. Results arrive in
            // completion order; dataset order is restored by index.
            while let Ok(message) = rx.recv() {
                match message {
                    WorkerMessage::Done(index, outcome) => {
                        outcomes[index] = Some(outcome);
                    }
                    WorkerMessage::InitFailed { worker, error } => {
                        cancel.store(true, Ordering::SeqCst);
                        if first_error.is_none() {
                            first_error = Some(BatchError::WorkerInit {
                                worker,
                                source: error,
                            });
                        }
                    }
                    WorkerMessage::Failed {
                        worker,
                        utterance,
                        error,
                    } => {
                        // Stop the other workers; keep draining so they
                        // can exit their send and tear down.
                        cancel.store(true, Ordering::SeqCst);
                        if first_error.is_none() {
                            first_error = Some(BatchError::Worker {
                                worker,
                                utterance,
                                source: error,
                            });
                        }
                    }
                }
            }
        });

        if let Some(error) = first_error {
            return Err(error);
        }
        if cancel.load(Ordering::SeqCst) {
            tracing::warn!("batch interrupted; discarding partial results");
            return Err(BatchError::Interrupted);
        }

        let outcomes: Vec<UtteranceOutcome> = outcomes
            .into_iter()
            .map(|o| o.expect("all utterances evaluated"))
            .collect();
        Ok(Report::build(outcomes))
    }

    fn worker_loop(
        &self,
        worker_id: usize,
        records: &[DatasetRecord],
        cursor: &AtomicUsize,
        cancel: &AtomicBool,
        tx: Sender<WorkerMessage>,
    ) {
        let mut decoder = match self.factory.initialize() {
            Ok(decoder) => decoder,
            Err(error) => {
                let _ = tx.send(WorkerMessage::InitFailed {
                    worker: worker_id,
                    error,
                });
                return;
            }
        };
        let mut evaluator =
            UtteranceEvaluator::new(self.options.poll_retries, self.options.poll_interval);

        loop {
            if cancel.load(Ordering::SeqCst) {
                break;
            }
            let index = cursor.fetch_add(1, Ordering::SeqCst);
            let Some(record) = records.get(index) else {
                break;
            };
            match evaluator.evaluate(decoder.as_mut(), record) {
                Ok(outcome) => {
                    if tx.send(WorkerMessage::Done(index, outcome)).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    let _ = tx.send(WorkerMessage::Failed {
                        worker: worker_id,
                        utterance: record.audio_path.clone(),
                        error,
                    });
                    break;
                }
            }
        }

        if let Err(e) = decoder.shutdown() {
            tracing::warn!("worker {worker_id} decoder shutdown failed: {e}");
        }
    }
}
