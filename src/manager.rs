use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use log::{debug, error};

/// Level-triggered cancellation flag shared by every worker. Any worker may
/// raise it; all workers poll it at loop boundaries.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Builds the body of one worker thread. The index distinguishes workers
/// within a group.
pub type WorkerFactory = Box<dyn FnMut(usize) -> Box<dyn FnOnce() + Send + 'static>>;

struct WorkerGroup {
    name: String,
    count: usize,
    start_order: usize,
    shutdown_order: usize,
    factory: WorkerFactory,
    handles: Vec<JoinHandle<()>>,
    started: bool,
}

/**
A supervisor for groups of long-lived worker threads.

Groups are started in registration order and joined in the reverse order,
so downstream stages (registered first) outlive the producers that feed
them. Threads cannot be forcibly killed; [`WorkerManager::halt`] raises
the stop flag that every worker polls and then joins.
*/
pub struct WorkerManager {
    name: &'static str,
    groups: Vec<WorkerGroup>,
}

impl std::fmt::Debug for WorkerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerManager")
            .field("name", &self.name)
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl WorkerManager {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            groups: Vec::new(),
        }
    }

    /// Add a worker group. Insertion order becomes the start order.
    pub fn register<F>(&mut self, name: &str, count: usize, factory: F)
    where
        F: FnMut(usize) -> Box<dyn FnOnce() + Send + 'static> + 'static,
    {
        let start_order = self.groups.len() + 1;
        self.groups.push(WorkerGroup {
            name: name.to_owned(),
            count,
            start_order,
            shutdown_order: 0,
            factory: Box::new(factory),
            handles: Vec::new(),
            started: false,
        });
        debug!(target: "manager", "{}: registered group {name} ({count} workers)", self.name);
    }

    /// Launch every group in start order. A spawn failure is logged and the
    /// remaining workers still come up.
    pub fn start(&mut self) {
        self.groups.sort_by_key(|g| g.start_order);
        let total = self.groups.len();
        for (idx, group) in self.groups.iter_mut().enumerate() {
            if group.started {
                continue;
            }
            group.shutdown_order = total - idx;
            for worker in 0..group.count {
                let body = (group.factory)(worker);
                let thread_name = format!("{}_{worker}", group.name);
                match thread::Builder::new().name(thread_name.clone()).spawn(body) {
                    Ok(handle) => {
                        debug!(target: "manager", "{}: started {thread_name}", self.name);
                        group.handles.push(handle);
                    }
                    Err(e) => {
                        error!(target: "manager", "{}: failed to start {thread_name}: {e}", self.name);
                    }
                }
            }
            group.started = true;
        }
    }

    /// Join every worker, in reverse start order.
    pub fn wait(&mut self) {
        self.groups.sort_by_key(|g| g.shutdown_order);
        for group in &mut self.groups {
            for handle in group.handles.drain(..) {
                debug!(target: "manager", "{}: joining a {} worker", self.name, group.name);
                let _ = handle.join();
            }
        }
    }

    /// Force shutdown: raise the stop flag and join in shutdown order.
    pub fn halt(&mut self, stop: &StopFlag) {
        debug!(target: "manager", "{}: halting all workers", self.name);
        stop.set();
        self.wait();
    }
}
