use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by a pipeline to its owner
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A stage or relay thread panicked before finishing
    #[error("Pipeline task '{task}' panicked")]
    TaskPanicked {
        /// Name of the thread that panicked
        task: String,
    },
}

impl PipelineError {
    /// Create a TaskPanicked error
    pub fn task_panicked(task: impl Into<String>) -> Self {
        Self::TaskPanicked { task: task.into() }
    }
}

/// Errors returned by non-blocking queue writes. The rejected item is handed back.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError<T> {
    /// The queue is bounded and currently full
    #[error("Queue is full")]
    Full(T),

    /// The queue has been closed
    #[error("Queue is closed")]
    Closed(T),
}

impl<T> QueueError<T> {
    /// Take back the item that could not be written
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) => item,
        }
    }

    /// Whether the write failed because the queue was closed
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}
