use super::{RequestTask, Worker, WorkerSettings};
use crate::error::{Error, Result};
use crate::network::Notifier;
use crossbeam_channel::{bounded, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Fixed set of worker threads draining a bounded task queue
pub struct WorkerPool {
    sender: Option<Sender<RequestTask>>,
    handles: Vec<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn `threads` workers sharing a queue of `capacity` tasks
    pub fn spawn(
        threads: usize,
        capacity: usize,
        settings: WorkerSettings,
        notifier: Notifier,
    ) -> Result<Self> {
        let (sender, receiver) = bounded(capacity);
        let cancel = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(threads);

        for id in 0..threads {
            let worker = Worker {
                id,
                receiver: receiver.clone(),
                notifier: notifier.clone(),
                cancel: Arc::clone(&cancel),
                settings: settings.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || worker.run())?;
            handles.push(handle);
        }

        info!(
            "Worker pool started: {} threads, queue capacity {}",
            threads, capacity
        );

        Ok(Self {
            sender: Some(sender),
            handles,
            cancel,
        })
    }

    /// Queue a task, blocking while the queue is full.
    ///
    /// A full queue is the backpressure point: the caller stalls until a
    /// worker frees a slot. `stop` is checked every `patience` so a pending
    /// shutdown is not held up by a saturated pool.
    pub fn submit(&self, task: RequestTask, stop: &AtomicBool, patience: Duration) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(Error::Shutdown)?;
        let mut task = task;

        loop {
            match sender.send_timeout(task, patience) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => {
                    if stop.load(Ordering::Acquire) {
                        return Err(Error::Shutdown);
                    }
                    debug!("Worker queue full ({} queued), waiting", sender.len());
                    task = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => return Err(Error::Shutdown),
            }
        }
    }

    /// Drain and stop the pool.
    ///
    /// Closing the queue lets workers finish what is already queued. If that
    /// takes longer than `grace`, workers are told to abandon queued and
    /// in-flight requests; after a second `grace` any stragglers are left
    /// detached.
    pub fn shutdown(mut self, grace: Duration) {
        drop(self.sender.take());

        if !wait_for(&self.handles, grace) {
            warn!("Worker pool still busy after {:?}, cancelling tasks", grace);
            self.cancel.store(true, Ordering::Release);

            if !wait_for(&self.handles, grace) {
                error!("Worker pool did not terminate");
            }
        }

        for handle in self.handles.drain(..) {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
        info!("Worker pool stopped");
    }
}

fn wait_for(handles: &[JoinHandle<()>], grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    loop {
        if handles.iter().all(|h| h.is_finished()) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
