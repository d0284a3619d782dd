use async_channel::Receiver;

use crate::result::JobResult;

/// A producer that exposes a finite stream of results, one per input
/// element, used to seed the pipeline. Non-restartable: a supplier backs
/// exactly one job execution.
pub trait Supplier<T>: Send {
    fn adapt(self: Box<Self>) -> Receiver<JobResult<T>>;
}

/// Default in-memory supplier backed by an ordered `Vec`.
pub struct DataSupplier<T> {
    data: Vec<T>,
}

impl<T> DataSupplier<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

impl<T: Clone + Send + 'static> Supplier<T> for DataSupplier<T> {
    fn adapt(self: Box<Self>) -> Receiver<JobResult<T>> {
        let (tx, rx) = async_channel::unbounded();
        let data = self.data;
        tokio::spawn(async move {
            for value in data {
                if tx.send(JobResult::seed(value)).await.is_err() {
                    tracing::debug!("supplier: downstream closed, stopping early");
                    break;
                }
            }
            tracing::trace!("supplier: exhausted");
        });
        rx
    }
}
