use crossbeam_channel::{Receiver, Sender};
use mio::{Token, Waker};
use std::sync::Arc;
use tracing::warn;

/// Why the server is going down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// `SHUTDOWN` command or signal
    Requested,
    /// The text file or its index could no longer be read
    DataUnavailable,
}

/// Message from a worker back to the reactor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The task finished, the connection may be polled again
    Released(Token),
    /// The task closed the connection
    Closed(Token),
    /// The task asked for the whole server to stop
    Shutdown(ShutdownReason),
}

/// Worker-side handle for reporting completions and waking the reactor
#[derive(Clone)]
pub struct Notifier {
    tx: Sender<Completion>,
    waker: Arc<Waker>,
}

impl Notifier {
    /// Create the notifier and the receiving end drained by the reactor
    pub fn channel(waker: Arc<Waker>) -> (Self, Receiver<Completion>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx, waker }, rx)
    }

    pub fn notify(&self, completion: Completion) {
        // Receiver only goes away once the reactor has stopped
        if self.tx.send(completion).is_err() {
            return;
        }
        if let Err(e) = self.waker.wake() {
            warn!("Failed to wake reactor: {}", e);
        }
    }
}
