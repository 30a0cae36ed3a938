use crate::error::{QueueError, Result};
use crate::junction::Junction;
use crate::queue::Queue;
use crate::stage::{Stage, StageRunner};
use crate::task::{DebugLog, TaskGroup};
use parking_lot::Mutex;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Construction parameters shared by every queue a pipeline creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Prefix for thread names, queue names and trace lines
    pub name: String,
    /// Capacity of the head and of every inter-stage queue. 0 means each
    /// hand-off waits for the reader.
    pub capacity: usize,
    /// Emit debug trace lines for attach and closure events
    pub debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "pipeline".to_string(),
            capacity: 0,
            debug: false,
        }
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder<T> {
    config: PipelineConfig,
    stages: Vec<Box<dyn Stage<T>>>,
}

impl<T: Send + 'static> PipelineBuilder<T> {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            stages: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Buffer capacity for every queue of the pipeline
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn debug(mut self, enable: bool) -> Self {
        self.config.debug = enable;
        self
    }

    /// Append a stage. Stages run in the order they are added.
    pub fn stage(mut self, stage: impl Stage<T>) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Wire the stages together and start them
    pub fn build(self) -> Pipeline<T> {
        Pipeline::with_config(self.config, self.stages)
    }
}

impl<T: Send + 'static> Default for PipelineBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered chain of stages between a head queue and a tail queue.
///
/// Every stage runs on its own thread from the moment it is added. Handles are
/// cheap to clone; all clones drive the same pipeline, so one thread can
/// enqueue while another dequeues.
pub struct Pipeline<T> {
    name: Arc<str>,
    capacity: usize,
    head: Queue<T>,
    tail: Arc<Mutex<Queue<T>>>,
    stage_count: Arc<AtomicUsize>,
    tasks: TaskGroup,
    log: DebugLog,
}

impl<T> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            capacity: self.capacity,
            head: self.head.clone(),
            tail: Arc::clone(&self.tail),
            stage_count: Arc::clone(&self.stage_count),
            tasks: self.tasks.clone(),
            log: self.log.clone(),
        }
    }
}

impl<T: Send + 'static> Pipeline<T> {
    /// Connect `stages` in order with synchronous hand-offs
    pub fn new(stages: Vec<Box<dyn Stage<T>>>) -> Self {
        Self::with_config(PipelineConfig::default(), stages)
    }

    /// Connect `stages` in order with queues holding up to `capacity` items
    pub fn buffered(capacity: usize, stages: Vec<Box<dyn Stage<T>>>) -> Self {
        Self::with_config(
            PipelineConfig {
                capacity,
                ..PipelineConfig::default()
            },
            stages,
        )
    }

    pub fn with_config(config: PipelineConfig, stages: Vec<Box<dyn Stage<T>>>) -> Self {
        let head = Queue::new(format!("{}/head", config.name), config.capacity);
        let pipeline = Self {
            log: DebugLog::new(&config.name, config.debug),
            name: Arc::from(config.name.as_str()),
            capacity: config.capacity,
            tail: Arc::new(Mutex::new(head.clone())),
            head,
            stage_count: Arc::new(AtomicUsize::new(0)),
            tasks: TaskGroup::default(),
        };
        for stage in stages {
            pipeline.add_boxed(stage);
        }
        pipeline
    }

    /// Append a stage to the tail of a running pipeline. Items already on
    /// their way to the old tail flow into the new stage.
    pub fn add_pipe(&self, stage: impl Stage<T>) -> &Self {
        self.add_boxed(Box::new(stage));
        self
    }

    fn add_boxed(&self, stage: Box<dyn Stage<T>>) {
        let index = self.stage_count.fetch_add(1, Ordering::Relaxed) + 1;
        let role = format!("stage-{}:{}", index, stage.name());
        let (input, output) = self.extend_tail(&role);
        self.log.debug(format_args!("attaching {role}"));

        let runner = StageRunner::new(input, output);
        self.spawn_task(&role, move || runner.run(&*stage));
    }

    /// Replace the tail with a fresh queue, returning `(old_tail, new_tail)`
    pub(crate) fn extend_tail(&self, role: &str) -> (Queue<T>, Queue<T>) {
        let output = self.new_queue(role);
        let mut tail = self.tail.lock();
        let input = std::mem::replace(&mut *tail, output.clone());
        (input, output)
    }

    /// Blocking write to the head.
    ///
    /// # Panics
    ///
    /// Panics if the pipeline has been closed.
    pub fn enqueue(&self, item: T) {
        self.head.send(item);
    }

    /// Non-blocking write to the head
    pub fn try_enqueue(&self, item: T) -> std::result::Result<(), QueueError<T>> {
        self.head.try_send(item)
    }

    /// Blocking read from the tail. `None` once the tail is closed and drained.
    pub fn dequeue(&self) -> Option<T> {
        self.tail().recv()
    }

    /// Read from the tail, giving up after `timeout`. A late item is kept for
    /// the next reader.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<T> {
        self.tail().recv_timeout(timeout)
    }

    /// Stop accepting items. Closure cascades stage by stage to the tail.
    ///
    /// # Panics
    ///
    /// Panics if the pipeline was already closed.
    pub fn close(&self) {
        self.log.debug(format_args!("closing pipeline head"));
        self.head.close();
    }

    /// Route items from this pipeline's tail through `junction`
    pub fn add_junction<K>(&self, junction: Junction<T, K>)
    where
        K: Hash + Eq + fmt::Debug + Send + 'static,
    {
        junction.attach(self);
    }

    /// Wait for every thread this pipeline has spawned. Returns once the
    /// pipeline has been closed and fully drained.
    ///
    /// Clones may join concurrently; each call returns only after every
    /// task has exited.
    pub fn join(&self) -> Result<()> {
        let result = self.tasks.join();
        self.log.debug(format_args!("all pipeline tasks finished"));
        result
    }

    /// Whether every thread spawned so far has exited
    pub fn is_finished(&self) -> bool {
        self.tasks.is_finished()
    }

    /// Turn on debug trace lines
    pub fn debug(&self) {
        self.log.enable();
    }

    pub(crate) fn spawn_task<F>(&self, role: &str, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.spawn(format!("{}/{}", self.name, role), task);
    }

    pub(crate) fn new_queue(&self, role: &str) -> Queue<T> {
        Queue::new(format!("{}/{}", self.name, role), self.capacity)
    }

    pub(crate) fn log(&self) -> &DebugLog {
        &self.log
    }
}

impl<T> Pipeline<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capacity of the pipeline's queues
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stages appended so far
    pub fn stage_count(&self) -> usize {
        self.stage_count.load(Ordering::Relaxed)
    }

    /// Entry queue. Writing to it is equivalent to [`Pipeline::enqueue`].
    pub fn head(&self) -> Queue<T> {
        self.head.clone()
    }

    /// Current exit queue
    pub fn tail(&self) -> Queue<T> {
        self.tail.lock().clone()
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name())
            .field("capacity", &self.capacity)
            .field("stages", &self.stage_count())
            .field("head", &self.head)
            .field("tail", &self.tail())
            .finish()
    }
}
