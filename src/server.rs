use crate::error::{Error, Result};
use crate::index;
use crate::network::{tune_socket, Completion, Connection, Notifier, ShutdownReason};
use crate::worker::{RequestTask, WorkerPool, WorkerSettings};
use crate::Config;
use crossbeam_channel::Receiver;
use mio::net::TcpListener as MioTcpListener;
use mio::{Events, Interest, Poll, Registry, Token, Waker};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CLIENT: usize = 2;

/// Line server for one text file
pub struct Server {
    config: Config,
    text_path: PathBuf,
    listener: TcpListener,
    shutdown: AtomicBool,
    data_lost: AtomicBool,
    active_connections: AtomicUsize,
    waker: OnceLock<Arc<Waker>>,
}

impl Server {
    /// Validate the configuration, bring the index up to date and bind.
    ///
    /// Everything that can fail before serving starts fails here.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let configured = config
            .text_path
            .as_deref()
            .ok_or_else(|| Error::Config("text_path is required".to_string()))?;
        if !configured.is_file() {
            return Err(Error::Config(format!(
                "Text file '{}' does not exist",
                configured.display()
            )));
        }
        let text_path = configured.canonicalize()?;

        index::ensure_current(&text_path)?;

        let listener = TcpListener::bind(format!("{}:{}", config.bind_addr, config.port))?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            text_path,
            listener,
            shutdown: AtomicBool::new(false),
            data_lost: AtomicBool::new(false),
            active_connections: AtomicUsize::new(0),
            waker: OnceLock::new(),
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Absolute path of the served file
    pub fn text_path(&self) -> &Path {
        &self.text_path
    }

    /// Get the number of active client connections
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Signal the server to shut down gracefully
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Initiating server shutdown");
        if let Some(waker) = self.waker.get() {
            let _ = waker.wake();
        }
    }

    /// Run the reactor on the calling thread until shutdown.
    ///
    /// Returns an error if serving stopped because the text file or its index
    /// became unreadable.
    pub fn run(self: Arc<Self>) -> Result<()> {
        let poll = Poll::new()?;

        let mut listener = MioTcpListener::from_std(self.listener.try_clone()?);
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);
        if self.waker.set(Arc::clone(&waker)).is_err() {
            return Err(Error::System("server is already running".to_string()));
        }
        let (notifier, completions) = Notifier::channel(waker);

        let settings = WorkerSettings {
            text_path: Arc::new(self.text_path.clone()),
            request_buffer_size: self.config.request_buffer_size,
            request_timeout: self.config.request_timeout(),
        };
        let pool = WorkerPool::spawn(
            self.config.threads,
            self.config.queue_capacity(),
            settings,
            notifier,
        )?;

        info!(
            "Serving {} on {}",
            self.text_path.display(),
            self.local_addr()?
        );

        let mut reactor = Reactor {
            server: &self,
            poll,
            listener,
            completions,
            pool,
            connections: HashMap::new(),
            next_token: FIRST_CLIENT,
        };
        let result = reactor.event_loop();
        reactor.stop();

        result?;
        if self.data_lost.load(Ordering::Acquire) {
            return Err(Error::System(
                "shut down because serving data became unavailable".to_string(),
            ));
        }
        info!("Server stopped");
        Ok(())
    }

    fn fail(&self, reason: ShutdownReason) {
        if reason == ShutdownReason::DataUnavailable {
            self.data_lost.store(true, Ordering::Release);
        }
        self.shutdown();
    }
}

/// State owned by the reactor thread
struct Reactor<'a> {
    server: &'a Server,
    poll: Poll,
    listener: MioTcpListener,
    completions: Receiver<Completion>,
    pool: WorkerPool,
    connections: HashMap<Token, Connection>,
    next_token: usize,
}

impl Reactor<'_> {
    fn event_loop(&mut self) -> Result<()> {
        let mut events = Events::with_capacity(1024);
        let interval = self.server.config.poll_interval();

        while !self.server.shutdown.load(Ordering::Acquire) {
            if let Err(e) = self.poll.poll(&mut events, Some(interval)) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(e.into());
            }

            // Releases first, so a connection freed in this round can be claimed below
            self.drain_completions();

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_connections(),
                    WAKER => {}
                    token => self.dispatch(token),
                }
            }
        }
        Ok(())
    }

    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    debug!("Connection accepted from {}", addr);

                    if let Err(e) = tune_socket(&stream, &self.server.config) {
                        warn!("Failed to tune socket for {}: {}", addr, e);
                    }

                    let token = Token(self.next_token);
                    self.next_token += 1;

                    match Connection::register(self.poll.registry(), stream, token, addr) {
                        Ok(connection) => {
                            self.connections.insert(token, connection);
                            self.server
                                .active_connections
                                .fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => error!("Failed to register {}: {}", addr, e),
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    break;
                }
            }
        }
    }

    /// Hand a readable, unclaimed connection to the pool
    fn dispatch(&mut self, token: Token) {
        let Some(connection) = self.connections.get_mut(&token) else {
            return;
        };
        // Claimed connections are skipped; release re-arms them
        let Some(stream) = connection.claim() else {
            return;
        };

        let task = RequestTask { token, stream };
        let patience = self.server.config.poll_interval();
        if let Err(e) = self.pool.submit(task, &self.server.shutdown, patience) {
            debug!("Dropping request on {:?}: {}", token, e);
            if let Some(connection) = self.connections.get_mut(&token) {
                connection.unclaim();
            }
        }
    }

    fn drain_completions(&mut self) {
        while let Ok(completion) = self.completions.try_recv() {
            match completion {
                Completion::Released(token) => {
                    let rearmed = match self.connections.get_mut(&token) {
                        Some(connection) => match connection.release(self.poll.registry()) {
                            Ok(()) => true,
                            Err(e) => {
                                error!("Failed to re-arm {}: {}", connection.addr, e);
                                false
                            }
                        },
                        None => true,
                    };
                    if !rearmed {
                        self.close(token);
                    }
                }
                Completion::Closed(token) => self.close(token),
                Completion::Shutdown(reason) => {
                    match reason {
                        ShutdownReason::Requested => info!("Shutdown requested by client"),
                        ShutdownReason::DataUnavailable => {
                            error!("Serving data unavailable, shutting down")
                        }
                    }
                    self.server.fail(reason);
                }
            }
        }
    }

    fn close(&mut self, token: Token) {
        if let Some(mut connection) = self.connections.remove(&token) {
            debug!(
                "Closing {} after {} requests",
                connection.addr,
                connection.requests()
            );
            connection.close(self.poll.registry());
            self.server
                .active_connections
                .fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Drain the pool, then drop every remaining connection
    fn stop(self) {
        let Reactor {
            server,
            poll,
            mut listener,
            pool,
            connections,
            ..
        } = self;

        let _ = poll.registry().deregister(&mut listener);
        pool.shutdown(server.config.shutdown_grace());
        close_all(poll.registry(), connections, server);
    }
}

fn close_all(registry: &Registry, connections: HashMap<Token, Connection>, server: &Server) {
    for (_, mut connection) in connections {
        connection.close(registry);
        server.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}
