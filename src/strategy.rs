use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{BoxError, LaborError},
    result::JobResult,
};

/// Reduces a batch of elements into a single representative value.
#[async_trait]
pub trait BatchStrategy<T>: Send + Sync {
    /// Constant for the lifetime of a job; must be >= 1.
    fn size(&self) -> usize;

    async fn reduce(&self, cx: CancellationToken, group: Vec<T>) -> Result<T, BoxError>;
}

/// Per-element labor applied after batching.
#[async_trait]
pub trait LaborStrategy<T>: Send + Sync {
    async fn work(&self, cx: CancellationToken, value: T) -> Result<T, LaborError<T>>;
}

/// Decides which failed results are worth retrying, and when a retry round
/// is the last one.
pub trait RetryStrategy<T>: Send + Sync {
    fn worth(&self, result: &JobResult<T>) -> bool;

    /// Consulted once per round, after that round's results are partitioned.
    /// A policy that wants exactly K retries should return `true` starting on
    /// its (K+1)-th call.
    fn forgo(&self) -> bool;
}

/// Pure side-effect sink invoked once per failed result leaving the digest
/// stage.
pub trait ErrorStrategy<T>: Send + Sync {
    fn on_error(&self, result: &JobResult<T>);
}

/// `size() == 1`, `reduce` returns the sole element of its group verbatim.
/// Wired in whenever a Job has no configured [`BatchStrategy`], so the hot
/// path never has to branch on an `Option`.
pub(crate) struct DefaultBatch;

#[async_trait]
impl<T: Send + 'static> BatchStrategy<T> for DefaultBatch {
    fn size(&self) -> usize {
        1
    }

    async fn reduce(&self, _cx: CancellationToken, mut group: Vec<T>) -> Result<T, BoxError> {
        Ok(group
            .pop()
            .expect("groups handed to reduce are never empty"))
    }
}

/// Identity labor, wired in whenever a Job has no configured [`LaborStrategy`].
pub(crate) struct DefaultLabor;

#[async_trait]
impl<T: Send + 'static> LaborStrategy<T> for DefaultLabor {
    async fn work(&self, _cx: CancellationToken, value: T) -> Result<T, LaborError<T>> {
        Ok(value)
    }
}
