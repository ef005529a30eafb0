//! Worker pool and the per-connection request task

mod context;
mod pool;

pub use context::WorkerContext;
pub use pool::WorkerPool;

use crate::error::{Error, Result};
use crate::network::{Completion, Notifier, ShutdownReason};
use crate::io::IoLimits;
use crate::protocol::{read_request, Command, Outcome, SocketSink};
use crossbeam_channel::Receiver;
use mio::net::TcpStream;
use mio::Token;
use std::net::Shutdown;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// One request on one claimed connection
pub struct RequestTask {
    pub token: Token,
    pub stream: Arc<TcpStream>,
}

/// What every worker needs to know about the data it serves
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub text_path: Arc<PathBuf>,
    pub request_buffer_size: usize,
    pub request_timeout: Option<Duration>,
}

struct Worker {
    id: usize,
    receiver: Receiver<RequestTask>,
    notifier: Notifier,
    cancel: Arc<AtomicBool>,
    settings: WorkerSettings,
}

impl Worker {
    fn run(self) {
        debug!("Worker {} started", self.id);
        let mut ctx = WorkerContext::new(self.settings.request_buffer_size);

        while let Ok(task) = self.receiver.recv() {
            if self.cancel.load(Ordering::Acquire) {
                // Abandoned; the reactor closes every connection on exit
                continue;
            }
            self.handle(&mut ctx, task);
        }

        debug!("Worker {} shutting down", self.id);
    }

    fn handle(&self, ctx: &mut WorkerContext, task: RequestTask) {
        let RequestTask { token, stream } = task;

        match self.serve(ctx, &stream) {
            Ok(Outcome::Continue) => self.notifier.notify(Completion::Released(token)),
            Ok(Outcome::Close) => {
                let _ = stream.shutdown(Shutdown::Both);
                self.notifier.notify(Completion::Closed(token));
            }
            Ok(Outcome::Shutdown) => {
                self.notifier
                    .notify(Completion::Shutdown(ShutdownReason::Requested));
                self.notifier.notify(Completion::Released(token));
            }
            Err(e) if e.is_fatal() => {
                error!("Worker {} aborted: {}", self.id, e);
                self.notifier
                    .notify(Completion::Shutdown(ShutdownReason::DataUnavailable));
            }
            Err(e) => {
                match e {
                    Error::ConnectionClosed | Error::Shutdown => {
                        debug!("Worker {} dropping {:?}: {}", self.id, token, e)
                    }
                    Error::RequestTimeout => {
                        warn!("Worker {} timed out on stalled {:?}", self.id, token)
                    }
                    _ => error!("Worker {} connection {:?} failed: {}", self.id, token, e),
                }
                let _ = stream.shutdown(Shutdown::Both);
                self.notifier.notify(Completion::Closed(token));
            }
        }
    }

    fn serve(&self, ctx: &mut WorkerContext, stream: &TcpStream) -> Result<Outcome> {
        let limits = IoLimits {
            timeout: self.settings.request_timeout,
            cancel: &self.cancel,
        };
        let request = read_request(stream, ctx.buffer(), limits)?;
        let command = Command::resolve(&request);
        debug!("Worker {} running {}", self.id, command.name());

        let (file, index) = ctx.resources(&self.settings.text_path)?;
        let mut sink = SocketSink::new(stream, limits);
        command.execute(&request, file, index, &mut sink)
    }
}
