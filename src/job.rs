use std::sync::Arc;

use async_channel::Receiver;
use tokio_util::sync::CancellationToken;

use crate::{
    result::{JobResult, Param},
    strategy::{BatchStrategy, DefaultBatch, DefaultLabor, ErrorStrategy, LaborStrategy, RetryStrategy},
    supplier::Supplier,
    task::Task,
};

mod retry;

/// Composes `drain -> group -> reduce -> labor -> digest` into the
/// retry-capable pipeline. Immutable once configured: strategies are set via
/// consuming fluent setters before the first call to [`Job::run`].
pub struct Job<T> {
    workers: usize,
    batch: Option<Arc<dyn BatchStrategy<T>>>,
    labor: Option<Arc<dyn LaborStrategy<T>>>,
    retry: Option<Arc<dyn RetryStrategy<T>>>,
    error: Option<Arc<dyn ErrorStrategy<T>>>,
}

impl<T> Job<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// `workers <= 0` defaults to `64 * available_parallelism()`, using
    /// `std::thread::available_parallelism()` directly rather than pulling
    /// in a dedicated CPU-count crate.
    pub fn new(workers: i64) -> Self {
        let workers = if workers <= 0 {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            cores * 64
        } else {
            workers as usize
        };
        Self {
            workers: workers.max(1),
            batch: None,
            labor: None,
            retry: None,
            error: None,
        }
    }

    pub fn batch_strategy(mut self, strategy: impl BatchStrategy<T> + 'static) -> Self {
        self.batch = Some(Arc::new(strategy));
        self
    }

    pub fn labor_strategy(mut self, strategy: impl LaborStrategy<T> + 'static) -> Self {
        self.labor = Some(Arc::new(strategy));
        self
    }

    pub fn retry_strategy(mut self, strategy: impl RetryStrategy<T> + 'static) -> Self {
        self.retry = Some(Arc::new(strategy));
        self
    }

    pub fn error_strategy(mut self, strategy: impl ErrorStrategy<T> + 'static) -> Self {
        self.error = Some(Arc::new(strategy));
        self
    }

    fn batch_size(&self) -> usize {
        self.batch.as_ref().map(|b| b.size()).unwrap_or(1).max(1)
    }

    fn batch_or_default(&self) -> Arc<dyn BatchStrategy<T>> {
        self.batch
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultBatch))
    }

    fn labor_or_default(&self) -> Arc<dyn LaborStrategy<T>> {
        self.labor
            .clone()
            .unwrap_or_else(|| Arc::new(DefaultLabor))
    }

    /// Top-level entry point. Derives a child cancellation scope from `cx`,
    /// runs drain -> group -> reduce -> labor -> digest, then the retry
    /// driver if a [`RetryStrategy`] is configured.
    #[tracing::instrument(skip_all, fields(workers = self.workers))]
    pub async fn run(&self, cx: CancellationToken, supplier: impl Supplier<T> + 'static) -> Vec<JobResult<T>> {
        let child = cx.child_token();
        let all_done = self.run_pipeline(child.clone(), Box::new(supplier)).await;
        child.cancel();

        let final_results = match &self.retry {
            None => {
                tracing::debug!("no retry strategy configured");
                all_done
            }
            Some(retry) => {
                tracing::debug!("running retry driver");
                retry::drive(self, cx, Arc::clone(retry), all_done).await
            }
        };
        tracing::debug!(count = final_results.len(), "job finished");
        final_results
    }

    /// Runs a single pass through the four stages, with no retry. Used both
    /// by [`Job::run`] and by the retry driver, which constructs a fresh Job
    /// per retry bucket and runs exactly one such pass per round.
    async fn run_pipeline(&self, cx: CancellationToken, supplier: Box<dyn Supplier<T>>) -> Vec<JobResult<T>> {
        let drained = self.drain(cx.clone(), supplier.adapt());
        let grouped = self.group(drained);
        let reduced = self.reduce(cx.clone(), grouped);
        let labored = self.labor(cx.clone(), reduced);
        self.digest(labored).await
    }

    #[tracing::instrument(skip_all)]
    fn drain(&self, cx: CancellationToken, input: Receiver<JobResult<T>>) -> Receiver<JobResult<T>> {
        let buffer = self.batch_size();
        Task::new("drain", self.workers, buffer).run(cx, input, |_cx, result| async move { result })
    }

    /// Re-chunks drained singletons into consecutive groups of `batch_size`
    /// elements (the final group may be shorter). A single async task, not a
    /// worker pool: grouping is inherently sequential over the drain order,
    /// so a pool of workers racing for chunks would scramble ordering within
    /// a group.
    fn group(&self, input: Receiver<JobResult<T>>) -> Receiver<JobResult<T>> {
        let batch_size = self.batch_size();
        let (tx, rx) = async_channel::bounded(batch_size.max(1));
        tokio::spawn(async move {
            let mut buf = Vec::with_capacity(batch_size);
            while let Ok(result) = input.recv().await {
                let value = match result.value {
                    Some(v) => v,
                    None => continue, // drain never fails; nothing to group.
                };
                buf.push(value);
                if buf.len() >= batch_size {
                    let group = std::mem::replace(&mut buf, Vec::with_capacity(batch_size));
                    if tx
                        .send(JobResult {
                            param: Param::Group(group),
                            value: None,
                            error: None,
                        })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
            if !buf.is_empty()
                && tx
                    .send(JobResult {
                        param: Param::Group(buf),
                        value: None,
                        error: None,
                    })
                    .await
                    .is_err()
            {
                return;
            }
            tracing::trace!("grouping buffer drained");
        });
        rx
    }

    #[tracing::instrument(skip_all)]
    fn reduce(&self, cx: CancellationToken, input: Receiver<JobResult<T>>) -> Receiver<JobResult<T>> {
        let strategy = self.batch_or_default();
        Task::new("reduce", self.workers, 1).run(cx, input, move |cx, result| {
            let strategy = Arc::clone(&strategy);
            async move {
                let group = match result.param {
                    Param::Group(g) => g,
                    Param::Single(v) => vec![v],
                };
                match strategy.reduce(cx, group.clone()).await {
                    Ok(reduced) => {
                        tracing::debug!(size = group.len(), "reduce succeeded");
                        JobResult {
                            param: Param::Group(group),
                            value: Some(reduced),
                            error: None,
                        }
                    }
                    Err(cause) => {
                        tracing::error!(size = group.len(), %cause, "reduce failed");
                        JobResult {
                            param: Param::Group(group),
                            value: None,
                            error: Some(Arc::new(crate::error::StageError::Batch(cause))),
                        }
                    }
                }
            }
        })
    }

    #[tracing::instrument(skip_all)]
    fn labor(&self, cx: CancellationToken, input: Receiver<JobResult<T>>) -> Receiver<JobResult<T>> {
        let strategy = self.labor_or_default();
        Task::new("labor", self.workers, 1).run(cx, input, move |cx, result| {
            let strategy = Arc::clone(&strategy);
            async move {
                if result.error.is_some() {
                    tracing::debug!("labor skipped, piping batch failure through");
                    return result;
                }
                let param = result.param;
                let input_value = result
                    .value
                    .expect("a successful result always carries a value");
                match strategy.work(cx, input_value).await {
                    Ok(produced) => {
                        tracing::debug!("labor succeeded");
                        JobResult {
                            param,
                            value: Some(produced),
                            error: None,
                        }
                    }
                    Err(failure) => {
                        tracing::error!(cause = %failure.source, "labor failed");
                        JobResult {
                            param,
                            value: failure.partial,
                            error: Some(Arc::new(crate::error::StageError::Labor(failure.source))),
                        }
                    }
                }
            }
        })
    }

    /// Collects every labor result, expanding each `Group` into one result
    /// per original element so every run's output count matches its input
    /// count regardless of batching, and invokes the configured
    /// [`ErrorStrategy`] once per failed, expanded result.
    #[tracing::instrument(skip_all)]
    async fn digest(&self, input: Receiver<JobResult<T>>) -> Vec<JobResult<T>> {
        let mut results = Vec::new();
        while let Ok(result) = input.recv().await {
            match result.param {
                Param::Single(elem) => {
                    let expanded = JobResult {
                        param: Param::Single(elem),
                        value: result.value,
                        error: result.error,
                    };
                    self.emit(&mut results, expanded);
                }
                Param::Group(elems) => {
                    for elem in elems {
                        let expanded = JobResult {
                            param: Param::Single(elem),
                            value: result.value.clone(),
                            error: result.error.clone(),
                        };
                        self.emit(&mut results, expanded);
                    }
                }
            }
        }
        tracing::debug!(count = results.len(), "digest finished");
        results
    }

    fn emit(&self, results: &mut Vec<JobResult<T>>, result: JobResult<T>) {
        if result.is_err()
            && let Some(error_strategy) = &self.error
        {
            error_strategy.on_error(&result);
        }
        results.push(result);
    }
}
