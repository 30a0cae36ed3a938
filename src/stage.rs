use crate::metrics::StageMetrics;
use crate::queue::Queue;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// A processing step in a pipeline.
///
/// `process` consumes `input` until it is closed and drained, writing zero or
/// more items to `output`. The pipeline closes `output` once `process`
/// returns; a stage may also close it itself.
pub trait Stage<T>: Send + Sync + 'static {
    fn process(&self, input: &Queue<T>, output: &Queue<T>);

    /// Human-readable name, used for thread names and traces
    fn name(&self) -> &str {
        "stage"
    }
}

impl<T, S: Stage<T> + ?Sized> Stage<T> for Arc<S> {
    fn process(&self, input: &Queue<T>, output: &Queue<T>) {
        (**self).process(input, output)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T, S: Stage<T> + ?Sized> Stage<T> for Box<S> {
    fn process(&self, input: &Queue<T>, output: &Queue<T>) {
        (**self).process(input, output)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Runs one stage between its input and output queues
pub(crate) struct StageRunner<T> {
    input: Queue<T>,
    output: Queue<T>,
}

impl<T: Send + 'static> StageRunner<T> {
    pub(crate) fn new(input: Queue<T>, output: Queue<T>) -> Self {
        Self { input, output }
    }

    /// Run the stage to completion. Dropping the runner closes the output
    /// queue, also when the stage panics.
    pub(crate) fn run(self, stage: &dyn Stage<T>) {
        stage.process(&self.input, &self.output);
    }
}

impl<T> Drop for StageRunner<T> {
    fn drop(&mut self) {
        if thread::panicking() {
            // Keep upstream writers from blocking on a stage that is gone
            for _ in self.input.iter() {}
        }
        self.output.close_if_open();
    }
}

/// Apply `f` to each input item, forwarding `Some` results and counting `None` as dropped
fn transform_each<T>(
    input: &Queue<T>,
    output: &Queue<T>,
    metrics: &StageMetrics,
    f: impl Fn(T) -> Option<T>,
) {
    for item in input {
        let start = Instant::now();
        let result = f(item);
        metrics.record_latency(start.elapsed().as_nanos() as u64);

        match result {
            Some(item) => {
                output.send(item);
                metrics.record_processed();
            }
            None => metrics.record_dropped(),
        }
    }
}

/// Forwards every item unchanged
#[derive(Debug, Default)]
pub struct PassthroughStage;

impl<T> Stage<T> for PassthroughStage {
    fn process(&self, input: &Queue<T>, output: &Queue<T>) {
        for item in input {
            output.send(item);
        }
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Transform-or-drop: the mapper returns `None` to decline an item
#[derive(Debug)]
pub struct TransformStage<F> {
    name: String,
    transform: F,
    metrics: StageMetrics,
}

impl<F> TransformStage<F> {
    pub fn new(name: impl Into<String>, transform: F) -> Self {
        Self {
            name: name.into(),
            transform,
            metrics: StageMetrics::new(),
        }
    }

    /// Handle onto this stage's counters
    pub fn metrics(&self) -> StageMetrics {
        self.metrics.clone()
    }
}

impl<T, F> Stage<T> for TransformStage<F>
where
    F: Fn(T) -> Option<T> + Send + Sync + 'static,
{
    fn process(&self, input: &Queue<T>, output: &Queue<T>) {
        transform_each(input, output, &self.metrics, &self.transform);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Transforms every item
#[derive(Debug)]
pub struct MapStage<F> {
    name: String,
    mapper: F,
    metrics: StageMetrics,
}

impl<F> MapStage<F> {
    pub fn new(name: impl Into<String>, mapper: F) -> Self {
        Self {
            name: name.into(),
            mapper,
            metrics: StageMetrics::new(),
        }
    }

    pub fn metrics(&self) -> StageMetrics {
        self.metrics.clone()
    }
}

impl<T, F> Stage<T> for MapStage<F>
where
    F: Fn(T) -> T + Send + Sync + 'static,
{
    fn process(&self, input: &Queue<T>, output: &Queue<T>) {
        transform_each(input, output, &self.metrics, |item| Some((self.mapper)(item)));
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Forwards items matching a predicate
#[derive(Debug)]
pub struct FilterStage<F> {
    name: String,
    predicate: F,
    metrics: StageMetrics,
}

impl<F> FilterStage<F> {
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
            metrics: StageMetrics::new(),
        }
    }

    pub fn metrics(&self) -> StageMetrics {
        self.metrics.clone()
    }
}

impl<T, F> Stage<T> for FilterStage<F>
where
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn process(&self, input: &Queue<T>, output: &Queue<T>) {
        transform_each(input, output, &self.metrics, |item| {
            (self.predicate)(&item).then_some(item)
        });
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A stage with full control over its queues, for batching, splitting or
/// stateful logic that does not fit one-in-one-out.
#[derive(Debug)]
pub struct WorkerStage<F> {
    name: String,
    worker: F,
}

impl<F> WorkerStage<F> {
    pub fn new(name: impl Into<String>, worker: F) -> Self {
        Self {
            name: name.into(),
            worker,
        }
    }
}

impl<T, F> Stage<T> for WorkerStage<F>
where
    F: Fn(&Queue<T>, &Queue<T>) + Send + Sync + 'static,
{
    fn process(&self, input: &Queue<T>, output: &Queue<T>) {
        (self.worker)(input, output)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
