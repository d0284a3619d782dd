//! A small concurrent pipeline: drain -> group -> reduce -> labor -> digest,
//! with pluggable batch/labor/retry/error strategies and per-stage worker
//! pools.

pub mod error;
pub mod job;
pub mod result;
pub mod strategy;
pub mod supplier;
pub mod task;

pub use crate::{
    error::{BoxError, LaborError, Stage, StageError},
    job::Job,
    result::{JobResult, Param},
    strategy::{BatchStrategy, ErrorStrategy, LaborStrategy, RetryStrategy},
    supplier::{DataSupplier, Supplier},
    task::Task,
};
