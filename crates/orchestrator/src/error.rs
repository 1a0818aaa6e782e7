use thiserror::Error;

use crate::run::LifecycleState;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("A batch is already active ({0})")]
    Busy(LifecycleState),

    #[error("The queue is empty")]
    EmptyQueue,

    #[error("Invalid worker count: {0}")]
    InvalidWorkerCount(usize),

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: LifecycleState,
    },

    #[error("No tokio runtime available to run the batch")]
    NoRuntime,

    #[error("Batch control loop failed: {0}")]
    Join(String),

    #[error(transparent)]
    Pipeline(#[from] pipeline::PipelineError),

    #[error(transparent)]
    Common(#[from] bubble_common::CommonError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BatchError>;
