use std::sync::Arc;

use crate::error::StageError;

/// What produced a [`JobResult`]: either a single element, or an ordered
/// group of elements assembled by the batching stage.
#[derive(Debug, Clone)]
pub enum Param<T> {
    Single(T),
    Group(Vec<T>),
}

impl<T> Param<T> {
    pub fn as_single(&self) -> Option<&T> {
        match self {
            Param::Single(v) => Some(v),
            Param::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&[T]> {
        match self {
            Param::Group(g) => Some(g),
            Param::Single(_) => None,
        }
    }
}

/// The uniform envelope flowing through every stage: `{P, R, E}`.
#[derive(Debug, Clone)]
pub struct JobResult<T> {
    pub param: Param<T>,
    pub value: Option<T>,
    /// Shared so the digest stage can cheaply clone one group failure into
    /// every expanded per-element result without re-synthesizing the error.
    pub error: Option<Arc<StageError>>,
}

impl<T> JobResult<T> {
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

impl<T: Clone> JobResult<T> {
    /// Seeds a fresh pipeline run for a single supplied value.
    pub fn seed(value: T) -> Self {
        JobResult {
            param: Param::Single(value.clone()),
            value: Some(value),
            error: None,
        }
    }
}
