use std::future::Future;
use std::sync::Arc;

use async_channel::Receiver;
use tokio_util::sync::CancellationToken;

/// A reusable worker-pool stage: `workers` concurrent consumers share a
/// single input channel, apply a transform, and share a single output
/// channel. `out` closes itself once every worker has exited, because each
/// worker holds one clone of the output `Sender` and drops it on exit —
/// ordinary channel ownership closes the channel without any explicit
/// countdown or waiter barrier.
pub struct Task {
    name: &'static str,
    workers: usize,
    buffer: usize,
}

impl Task {
    pub fn new(name: &'static str, workers: usize, buffer: usize) -> Self {
        Self {
            name,
            workers: workers.max(1),
            buffer: buffer.max(1),
        }
    }

    /// Runs this stage: spawns `workers` tasks, each looping on `recv -> f
    /// -> send` until `input` closes, cancellation fires, or the output
    /// side is dropped.
    #[tracing::instrument(skip_all, fields(stage = self.name, workers = self.workers))]
    pub fn run<In, Out, F, Fut>(
        &self,
        cx: CancellationToken,
        input: Receiver<In>,
        f: F,
    ) -> Receiver<Out>
    where
        In: Send + 'static,
        Out: Send + 'static,
        F: Fn(CancellationToken, In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send,
    {
        let (tx, rx) = async_channel::bounded(self.buffer);
        let f = Arc::new(f);
        for worker_id in 0..self.workers {
            let input = input.clone();
            let tx = tx.clone();
            let f = Arc::clone(&f);
            let cx = cx.clone();
            let name = self.name;
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cx.cancelled() => {
                            tracing::debug!(stage = name, worker_id, "cancelled, worker exiting");
                            break;
                        }
                        item = input.recv() => {
                            let item = match item {
                                Ok(item) => item,
                                Err(_) => {
                                    tracing::trace!(stage = name, worker_id, "input closed, worker exiting");
                                    break;
                                }
                            };
                            let out = f(cx.clone(), item).await;
                            if tx.send(out).await.is_err() {
                                tracing::debug!(stage = name, worker_id, "output closed, worker exiting");
                                break;
                            }
                        }
                    }
                }
            });
        }
        rx
    }
}
