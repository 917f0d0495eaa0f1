//! Embedding Batcher (component C, spec.md §4.C).
//!
//! Single-writer cooperative queue: one background `tokio` task owns the
//! `Embedder` and is the only thing that ever calls it, while any number of
//! callers submit text batches concurrently and each gets back a
//! caller-order-aligned slice of vectors. Flush triggers on size, a timeout,
//! or accumulated byte size, whichever comes first (spec.md §4.C "flush
//! triggers").
//!
//! Grounded on `codescope-server/src/watch.rs`'s `debounce_loop`: a single
//! consumer thread draining a channel with a timeout, accumulating into a
//! pending buffer, and flushing once a threshold is crossed. Adapted from
//! `std::sync::mpsc` + blocking `recv_timeout` to `tokio::sync::mpsc` +
//! `tokio::select!`, since the rest of the pipeline is async, and from a
//! per-path debounce map to an ordered job queue since embeddings (unlike
//! file-change coalescing) must preserve caller order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use codesift_core::CodesiftError;

use super::provider::Embedder;
use crate::config::BatchConfig;

struct BatchJob {
    texts: Vec<String>,
    respond_to: oneshot::Sender<Result<Vec<Vec<f32>>, CodesiftError>>,
}

enum Message {
    Job(BatchJob),
    /// Explicit `flush()` trigger (spec.md §4.C "An explicit flush() is
    /// invoked, e.g. at end of indexing"): force the current pending buffer
    /// out immediately, regardless of size/timeout/memory thresholds.
    Flush(oneshot::Sender<()>),
}

/// Handle to a running batcher. Cloning shares the same background task and
/// queue (spec.md §4.C "single writer, many callers").
#[derive(Clone)]
pub struct EmbeddingBatcher {
    sender: mpsc::Sender<Message>,
}

impl EmbeddingBatcher {
    /// Spawn the background batching task. The task runs until every
    /// `EmbeddingBatcher` handle (and its sender) is dropped.
    pub fn spawn(embedder: Arc<dyn Embedder>, config: BatchConfig) -> Self {
        let (sender, receiver) = mpsc::channel(4096);
        tokio::spawn(run(embedder, config, receiver));
        EmbeddingBatcher { sender }
    }

    /// Embed `texts`, returning one vector per input in the same order.
    /// Returns `Ok(vec![])` for an empty input without round-tripping
    /// through the batcher at all.
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, CodesiftError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(Message::Job(BatchJob { texts, respond_to }))
            .await
            .map_err(|_| CodesiftError::Cancelled)?;
        response.await.map_err(|_| CodesiftError::Cancelled)?
    }

    /// Force any pending jobs out now, without waiting for the size, byte,
    /// or timeout trigger (spec.md §4.C). Called at the end of a reindex run
    /// so the last partial batch isn't left waiting on the idle timer.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.sender.send(Message::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run(embedder: Arc<dyn Embedder>, config: BatchConfig, mut receiver: mpsc::Receiver<Message>) {
    let mut pending: Vec<BatchJob> = Vec::new();
    let mut pending_texts = 0usize;
    let mut pending_bytes = 0usize;

    loop {
        let timeout = tokio::time::sleep(Duration::from_millis(config.batch_timeout_ms));
        tokio::pin!(timeout);

        tokio::select! {
            biased;

            msg = receiver.recv() => {
                match msg {
                    Some(Message::Job(job)) => {
                        pending_texts += job.texts.len();
                        pending_bytes += job.texts.iter().map(|t| t.len()).sum::<usize>();
                        pending.push(job);

                        if pending_texts >= config.batch_size || pending_bytes >= config.batch_memory_limit_bytes {
                            flush_pending(&embedder, std::mem::take(&mut pending)).await;
                            pending_texts = 0;
                            pending_bytes = 0;
                        }
                    }
                    Some(Message::Flush(done)) => {
                        if !pending.is_empty() {
                            flush_pending(&embedder, std::mem::take(&mut pending)).await;
                            pending_texts = 0;
                            pending_bytes = 0;
                        }
                        let _ = done.send(());
                    }
                    None => {
                        if !pending.is_empty() {
                            flush_pending(&embedder, std::mem::take(&mut pending)).await;
                        }
                        return;
                    }
                }
            }

            _ = &mut timeout, if !pending.is_empty() => {
                flush_pending(&embedder, std::mem::take(&mut pending)).await;
                pending_texts = 0;
                pending_bytes = 0;
            }
        }
    }
}

/// Run the embedder once over every job's concatenated texts, then slice the
/// result back out per caller in submission order (spec.md §4.C "per-caller
/// order-aligned output").
async fn flush_pending(embedder: &Arc<dyn Embedder>, jobs: Vec<BatchJob>) {
    let mut boundaries = Vec::with_capacity(jobs.len());
    let mut all_texts = Vec::new();
    for job in &jobs {
        boundaries.push(job.texts.len());
        all_texts.extend(job.texts.iter().cloned());
    }

    let embedder = Arc::clone(embedder);
    let result = tokio::task::spawn_blocking(move || embedder.embed_batch(&all_texts)).await;

    match result {
        Ok(Ok(vectors)) => {
            let mut idx = 0;
            for (job, n) in jobs.into_iter().zip(boundaries) {
                let slice = vectors.get(idx..idx + n).map(|s| s.to_vec()).unwrap_or_default();
                idx += n;
                let _ = job.respond_to.send(Ok(slice));
            }
        }
        Ok(Err(e)) => {
            for job in jobs {
                let _ = job.respond_to.send(Err(clone_error(&e)));
            }
        }
        Err(_) => {
            for job in jobs {
                let _ = job.respond_to.send(Err(CodesiftError::Cancelled));
            }
        }
    }
}

fn clone_error(e: &CodesiftError) -> CodesiftError {
    CodesiftError::ProviderApiError { code: "embed_failed".to_string(), message: e.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::provider::DeterministicEmbedder;

    #[tokio::test]
    async fn two_concurrent_callers_get_order_aligned_results() {
        let embedder = Arc::new(DeterministicEmbedder::new(8));
        let batcher = EmbeddingBatcher::spawn(embedder, BatchConfig { batch_size: 100, batch_timeout_ms: 20, batch_memory_limit_bytes: usize::MAX });

        let a = batcher.embed(vec!["one".to_string(), "two".to_string()]);
        let b = batcher.embed(vec!["three".to_string()]);
        let (a, b) = tokio::join!(a, b);
        let a = a.unwrap();
        let b = b.unwrap();

        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);

        let direct = DeterministicEmbedder::new(8);
        assert_eq!(a[0], direct.embed_batch(&["one".to_string()]).unwrap()[0]);
        assert_eq!(b[0], direct.embed_batch(&["three".to_string()]).unwrap()[0]);
    }

    #[tokio::test]
    async fn size_trigger_flushes_without_waiting_for_timeout() {
        let embedder = Arc::new(DeterministicEmbedder::new(4));
        let batcher = EmbeddingBatcher::spawn(embedder, BatchConfig { batch_size: 1, batch_timeout_ms: 60_000, batch_memory_limit_bytes: usize::MAX });

        let result = tokio::time::timeout(Duration::from_secs(2), batcher.embed(vec!["quick".to_string()])).await;
        assert!(result.is_ok(), "size-triggered flush should not wait for the timeout");
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let embedder = Arc::new(DeterministicEmbedder::new(4));
        let batcher = EmbeddingBatcher::spawn(embedder, BatchConfig::default());
        let result = batcher.embed(Vec::new()).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn explicit_flush_delivers_a_pending_job_before_the_timeout() {
        let embedder = Arc::new(DeterministicEmbedder::new(4));
        let batcher = EmbeddingBatcher::spawn(
            embedder,
            BatchConfig { batch_size: 100, batch_timeout_ms: 60_000, batch_memory_limit_bytes: usize::MAX },
        );

        let call = batcher.embed(vec!["lonely".to_string()]);
        let flush = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            batcher.flush().await;
        };
        let (result, _) = tokio::join!(call, flush);
        assert_eq!(result.unwrap().len(), 1);
    }
}
