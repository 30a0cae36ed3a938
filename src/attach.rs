//! Sources, sinks, fan-out sinks and taps attached at a pipeline's ends.

use crate::pipeline::Pipeline;
use crate::queue::Queue;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

impl<T: Send + 'static> Pipeline<T> {
    /// Relay every item of `source` into the head, then close the pipeline
    /// once `source` is closed and drained.
    pub fn attach_source(&self, source: Queue<T>) {
        let head = self.head();
        let log = self.log().clone();
        log.debug(format_args!("attaching source '{}'", source.name()));

        self.spawn_task("source", move || {
            for item in &source {
                head.send(item);
            }
            log.debug(format_args!("source '{}' closed, closing pipeline", source.name()));
            head.close();
        });
    }

    /// Relay every item from the tail into `sink`, closing `sink` once the
    /// tail is closed.
    pub fn attach_sink(&self, sink: Queue<T>) {
        let tail = self.tail();
        let log = self.log().clone();
        log.debug(format_args!("attaching sink '{}'", sink.name()));

        self.spawn_task("sink", move || {
            for item in &tail {
                sink.send(item);
            }
            log.debug(format_args!("shutting down sink '{}'", sink.name()));
            sink.close();
        });
    }

    /// Send each tail item to the destination named by `route`.
    ///
    /// Items go to `unrouted` when `route` returns an error, returns no key,
    /// or returns a key with no destination. Delivery blocks, so `unrouted`
    /// must be drained like any destination. When the tail closes every
    /// destination and `unrouted` are closed once.
    pub fn attach_sink_fan_out<K, E, F>(
        &self,
        destinations: HashMap<K, Queue<T>>,
        unrouted: Queue<T>,
        route: F,
    ) where
        K: Hash + Eq + fmt::Debug + Send + 'static,
        E: fmt::Display,
        F: Fn(&T) -> Result<Option<K>, E> + Send + 'static,
    {
        let tail = self.tail();
        let log = self.log().clone();
        log.debug(format_args!(
            "attaching fan-out sink with {} destination(s)",
            destinations.len()
        ));

        self.spawn_task("fan-out", move || {
            for item in &tail {
                let destination = match route(&item) {
                    Ok(Some(key)) => destinations.get(&key).unwrap_or_else(|| {
                        log.debug(format_args!("no destination for routing key {key:?}"));
                        &unrouted
                    }),
                    Ok(None) => &unrouted,
                    Err(err) => {
                        log.debug(format_args!("routing failed: {err}"));
                        &unrouted
                    }
                };
                destination.send(item);
            }

            log.debug(format_args!("shutting down fan-out sink"));
            let mut closed: Vec<&Queue<T>> = Vec::with_capacity(destinations.len() + 1);
            for (key, queue) in &destinations {
                if !closed.iter().any(|c| c.same_queue(queue)) {
                    log.debug(format_args!("closing queue for routing key {key:?}"));
                    queue.close();
                    closed.push(queue);
                }
            }
            if !closed.iter().any(|c| c.same_queue(&unrouted)) {
                unrouted.close();
            }
        });
    }

    /// Mirror every item that reaches the tail into `tap`.
    ///
    /// Each item is written to the tap side before the main tail, and the next
    /// item is not read until both writes finish, so a slow tap consumer also
    /// slows the main path.
    pub fn attach_tap(&self, tap: Queue<T>)
    where
        T: Clone,
    {
        let (source, tail) = self.extend_tail("tap");
        let side = self.new_queue("tap-side");
        let log = self.log().clone();
        log.debug(format_args!("attaching tap '{}'", tap.name()));

        let relay_side = side.clone();
        let relay_log = log.clone();
        self.spawn_task("tap", move || {
            for item in &source {
                relay_side.send(item.clone());
                tail.send(item);
            }
            relay_log.debug(format_args!("tap source closed, closing rest of the pipeline"));
            relay_side.close();
            tail.close();
        });

        self.spawn_task("tap-out", move || {
            for item in &side {
                tap.send(item);
            }
            log.debug(format_args!("closing tap '{}'", tap.name()));
            tap.close();
        });
    }
}
