//! Composable in-process pipelines of concurrent stages.
//!
//! Items enter a [`Pipeline`] at its head, flow through an ordered chain of
//! [`Stage`]s, and leave at its tail. Every stage runs on its own thread and
//! hands items to the next one over a closable [`Queue`]. Closing the head
//! cascades stage by stage to the tail.
//!
//! At the tail a pipeline can feed:
//!
//! - a plain sink queue ([`Pipeline::attach_sink`])
//! - a fan-out sink that picks one of several queues per item, with a queue
//!   for unrouted items ([`Pipeline::attach_sink_fan_out`])
//! - a [`Junction`] that routes items into other pipelines by key
//!
//! and a tap ([`Pipeline::attach_tap`]) can mirror every item to a second
//! consumer without disturbing the main path.
//!
//! # Example
//!
//! ```
//! use pipeflow::{MapStage, PipelineBuilder, Queue};
//!
//! let pipeline = PipelineBuilder::<i32>::new()
//!     .name("numbers")
//!     .stage(MapStage::new("double", |x: i32| x * 2))
//!     .stage(MapStage::new("decrement", |x: i32| x - 1))
//!     .build();
//!
//! let source = Queue::new("input", 4);
//! pipeline.attach_source(source.clone());
//! for i in 0..4 {
//!     source.send(i);
//! }
//! source.close();
//!
//! let output: Vec<i32> = std::iter::from_fn(|| pipeline.dequeue()).collect();
//! assert_eq!(output, vec![-1, 1, 3, 5]);
//! pipeline.join()?;
//! # Ok::<(), pipeflow::PipelineError>(())
//! ```

mod attach;
pub mod error;
pub mod junction;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod stage;
mod task;

// Re-exports for convenience
pub use error::{PipelineError, QueueError, Result};
pub use junction::Junction;
pub use metrics::{LatencyWindow, MetricsSnapshot, StageMetrics};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineConfig};
pub use queue::{Drain, Queue};
pub use stage::{FilterStage, MapStage, PassthroughStage, Stage, TransformStage, WorkerStage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
