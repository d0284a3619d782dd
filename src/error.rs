use std::fmt;

use thiserror::Error;

/// Opaque cause carried by a [`StageError`]. Causes are boxed rather than
/// threaded through as a generic error type parameter on every strategy
/// trait.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which pipeline stage produced a [`StageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Batch,
    Labor,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Batch => write!(f, "batch"),
            Stage::Labor => write!(f, "labor"),
        }
    }
}

/// The only two framework-recognized failure kinds. Every error the pipeline
/// produces is tagged with its originating stage at the point of creation;
/// there is no "unknown" variant because nothing in a statically typed
/// pipeline can reach the retry driver untagged.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("batch stage failed: {0}")]
    Batch(#[source] BoxError),

    #[error("labor stage failed: {0}")]
    Labor(#[source] BoxError),
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Batch(_) => Stage::Batch,
            StageError::Labor(_) => Stage::Labor,
        }
    }
}

/// Failure returned by [`crate::strategy::LaborStrategy::work`].
///
/// A plain `Result<T, E>` can't carry a value on its `Err` arm, but labor is
/// explicitly tolerant of work that produces something useful before it
/// fails. `partial` is threaded through to the resulting [`crate::result::JobResult`]'s
/// `R` field instead of being discarded.
#[derive(Debug)]
pub struct LaborError<T> {
    pub partial: Option<T>,
    pub source: BoxError,
}

impl<T> LaborError<T> {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            partial: None,
            source: source.into(),
        }
    }

    pub fn with_partial(partial: T, source: impl Into<BoxError>) -> Self {
        Self {
            partial: Some(partial),
            source: source.into(),
        }
    }
}

impl<T: fmt::Debug> fmt::Display for LaborError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl<T: fmt::Debug> std::error::Error for LaborError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}
