use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    error::Stage,
    job::Job,
    result::{JobResult, Param},
    strategy::RetryStrategy,
    supplier::DataSupplier,
};

/// The retry driver. Runs in the calling scope after digest returns. Each
/// round partitions the working slice into `final` / `batch_retries` /
/// `labor_retries`, consults `forgo()`, and — unless this round is the last
/// — re-dispatches each non-empty bucket through a freshly constructed Job
/// seeded from the bucket's elements.
///
/// Because the digest stage already expanded every batch group into
/// individually-addressed elements, every `Param` this driver ever sees is
/// `Single` — there is no defensive "is this actually a group" branch to
/// fall back on.
pub(super) async fn drive<T>(
    template: &Job<T>,
    cx: CancellationToken,
    retry: Arc<dyn RetryStrategy<T>>,
    mut all_done: Vec<JobResult<T>>,
) -> Vec<JobResult<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let mut final_results = Vec::new();
    let mut round = 1u32;

    loop {
        let mut batch_retries = Vec::new();
        let mut batch_failed = Vec::new();
        let mut labor_retries = Vec::new();
        let mut labor_failed = Vec::new();

        for result in all_done.drain(..) {
            if !retry.worth(&result) {
                final_results.push(result);
                continue;
            }
            match result.error.as_ref().map(|e| e.stage()) {
                Some(Stage::Batch) => {
                    if let Param::Single(elem) = &result.param {
                        batch_retries.push(elem.clone());
                    }
                    batch_failed.push(result);
                }
                Some(Stage::Labor) => {
                    if let Param::Single(elem) = &result.param {
                        labor_retries.push(elem.clone());
                    }
                    labor_failed.push(result);
                }
                None => final_results.push(result),
            }
        }

        if retry.forgo() {
            tracing::debug!(
                round,
                batch_failed = batch_failed.len(),
                labor_failed = labor_failed.len(),
                "retry ended"
            );
            final_results.extend(batch_failed);
            final_results.extend(labor_failed);
            break;
        }

        tracing::debug!(
            round,
            batch_retries = batch_retries.len(),
            labor_retries = labor_retries.len(),
            "retry round starting"
        );

        let labor_only = (!labor_retries.is_empty()).then(|| Job {
            workers: template.workers,
            batch: None,
            labor: template.labor.clone(),
            retry: None,
            error: None,
        });
        let batch_and_labor = (!batch_retries.is_empty()).then(|| Job {
            workers: template.workers,
            batch: template.batch.clone(),
            labor: template.labor.clone(),
            retry: None,
            error: None,
        });

        let (labor_results, batch_results) = tokio::join!(
            run_bucket(labor_only, cx.clone(), labor_retries),
            run_bucket(batch_and_labor, cx.clone(), batch_retries),
        );

        all_done = labor_results;
        all_done.extend(batch_results);
        round += 1;
    }

    final_results
}

fn run_bucket<T>(
    job: Option<Job<T>>,
    cx: CancellationToken,
    seed: Vec<T>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Vec<JobResult<T>>> + Send>>
where
    T: Clone + Send + Sync + 'static,
{
    // `Job::run` re-enters the retry driver when the rebuilt Job itself
    // carries a RetryStrategy (it never does here — see the `retry: None`
    // literals above — but the recursion is still present in the type
    // graph), so this indirection is required to give the future a
    // finite size.
    Box::pin(async move {
        match job {
            Some(job) => job.run(cx, DataSupplier::new(seed)).await,
            None => Vec::new(),
        }
    })
}
