//! Bounded decode worker pool

use std::thread;

use flume::{Receiver, Sender};
use tracing::{debug, error, warn};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of worker threads fed from one task queue
pub struct WorkerPool {
    tx: Option<Sender<Task>>,
    rx: Receiver<Task>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (tx, rx) = flume::unbounded::<Task>();

        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let rx = rx.clone();
            let spawned = thread::Builder::new()
                .name(format!("glyphcast-decode-{i}"))
                .spawn(move || {
                    while let Ok(task) = rx.recv() {
                        task();
                    }
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => error!("Failed to spawn decode worker {}: {}", i, e),
            }
        }

        if workers.is_empty() {
            warn!("No decode workers running; tasks will run on the submitting thread");
        } else {
            debug!("Decode pool started with {} workers", workers.len());
        }

        Self {
            tx: Some(tx),
            rx,
            workers,
        }
    }

    pub fn submit(&self, task: Task) {
        if self.workers.is_empty() {
            task();
            return;
        }
        if let Some(tx) = &self.tx {
            if let Err(flume::SendError(task)) = tx.send(task) {
                task();
            }
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Tasks submitted but not yet picked up by a worker
    pub fn queued(&self) -> usize {
        self.rx.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Close the queue, discard unstarted work, wait for running tasks
        self.tx.take();
        let dropped = self.rx.drain().count();
        if dropped > 0 {
            debug!("Discarded {} queued decode tasks", dropped);
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Decode worker exited with a panic");
            }
        }
    }
}
