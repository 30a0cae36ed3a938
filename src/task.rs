use crate::error::{PipelineError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Threads spawned on behalf of one pipeline, joined together by its owner
#[derive(Clone, Default)]
pub(crate) struct TaskGroup {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
    /// Held for the whole of a join so concurrent joiners queue up behind it
    joining: Arc<Mutex<()>>,
}

impl TaskGroup {
    pub(crate) fn spawn<F>(&self, name: String, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(task)
            .unwrap_or_else(|e| panic!("failed to spawn pipeline task '{name}': {e}"));
        self.handles.lock().push(handle);
    }

    /// Wait for every task, including tasks spawned while waiting.
    /// Reports the first task that panicked.
    ///
    /// A second caller blocks until the running join completes. Only the
    /// caller that joined a panicked task sees its error.
    pub(crate) fn join(&self) -> Result<()> {
        let _joining = self.joining.lock();
        let mut first_panic = None;
        loop {
            let handles = std::mem::take(&mut *self.handles.lock());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                let task = handle.thread().name().unwrap_or("unnamed").to_string();
                if handle.join().is_err() {
                    tracing::error!(task = %task, "pipeline task panicked");
                    first_panic.get_or_insert(PipelineError::task_panicked(task));
                }
            }
        }
        first_panic.map_or(Ok(()), Err)
    }

    pub(crate) fn is_finished(&self) -> bool {
        !self.joining.is_locked() && self.handles.lock().iter().all(JoinHandle::is_finished)
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.lock().len()
    }
}

impl fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGroup").field("pending", &self.len()).finish()
    }
}

/// Opt-in trace lines for attach, detach and closure events
#[derive(Clone, Debug)]
pub(crate) struct DebugLog {
    pipeline: Arc<str>,
    enabled: Arc<AtomicBool>,
}

impl DebugLog {
    pub(crate) fn new(pipeline: &str, enabled: bool) -> Self {
        Self {
            pipeline: Arc::from(pipeline),
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub(crate) fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn debug(&self, message: fmt::Arguments<'_>) {
        if self.is_enabled() {
            tracing::debug!(pipeline = %self.pipeline, "{}", message);
        }
    }
}
