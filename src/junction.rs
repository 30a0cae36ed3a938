//! Key-based routing from one pipeline's tail into other pipelines.
//!
//! A [`Junction`] owns a routing function and a table of destination
//! pipelines. Once attached to a source pipeline it is consumed, so its table
//! can no longer change while items flow. Destinations may carry junctions of
//! their own, forming a routing tree.
//!
//! The junction does not own its destinations. When the source runs dry it
//! leaves them open unless [`Junction::close_destinations_on_exit`] was set,
//! so several junctions can merge into one pipeline.
//!
//! A single relay thread serves every key of a junction. Delivery is a
//! blocking enqueue, so a destination that stops draining stalls delivery to
//! all other keys of the same junction until it catches up.

use crate::metrics::StageMetrics;
use crate::pipeline::Pipeline;
use crate::queue::Queue;
use crate::task::DebugLog;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Routes each item to the pipeline registered under the key its routing function returns
pub struct Junction<T, K> {
    route: Box<dyn Fn(&T) -> K + Send + 'static>,
    destinations: HashMap<K, Queue<T>>,
    close_destinations: bool,
    metrics: StageMetrics,
}

impl<T, K> Junction<T, K>
where
    T: Send + 'static,
    K: Hash + Eq + fmt::Debug + Send + 'static,
{
    /// Create a junction with no destinations
    pub fn new(route: impl Fn(&T) -> K + Send + 'static) -> Self {
        Self {
            route: Box::new(route),
            destinations: HashMap::new(),
            close_destinations: false,
            metrics: StageMetrics::new(),
        }
    }

    /// Send items whose key is `key` into `pipeline`. A later registration
    /// for the same key replaces this one.
    pub fn add_pipeline(&mut self, key: K, pipeline: &Pipeline<T>) -> &mut Self {
        self.destinations.insert(key, pipeline.head());
        self
    }

    /// Close each distinct destination pipeline once the source runs dry.
    /// Only set this when the junction is the sole writer to its destinations.
    pub fn close_destinations_on_exit(&mut self) -> &mut Self {
        self.close_destinations = true;
        self
    }

    /// Routed items count as processed, items without a destination as dropped
    pub fn metrics(&self) -> StageMetrics {
        self.metrics.clone()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.destinations.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Start routing items from `source`'s tail
    pub fn attach(self, source: &Pipeline<T>) {
        let input = source.tail();
        let log = source.log().clone();
        log.debug(format_args!(
            "attaching junction with {} destination(s) to '{}'",
            self.destinations.len(),
            input.name()
        ));
        source.spawn_task("junction", move || self.run(&input, &log));
    }

    fn run(self, input: &Queue<T>, log: &DebugLog) {
        for item in input {
            let key = (self.route)(&item);
            match self.destinations.get(&key) {
                Some(destination) => {
                    destination.send(item);
                    self.metrics.record_processed();
                }
                None => {
                    log.debug(format_args!("no pipeline for routing key {key:?}, dropping item"));
                    self.metrics.record_dropped();
                }
            }
        }

        if !self.close_destinations {
            log.debug(format_args!("junction source closed"));
            return;
        }
        log.debug(format_args!("junction source closed, closing destination pipelines"));
        let mut closed: Vec<&Queue<T>> = Vec::with_capacity(self.destinations.len());
        for (key, destination) in &self.destinations {
            if closed.iter().any(|queue| queue.same_queue(destination)) {
                continue;
            }
            log.debug(format_args!("closing pipeline for routing key {key:?}"));
            destination.close();
            closed.push(destination);
        }
    }
}

impl<T, K: fmt::Debug> fmt::Debug for Junction<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Junction")
            .field("keys", &self.destinations.keys().collect::<Vec<_>>())
            .field("close_destinations", &self.close_destinations)
            .finish_non_exhaustive()
    }
}
