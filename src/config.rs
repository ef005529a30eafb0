use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bind address
    pub bind_addr: String,

    /// Port to listen on (0 picks an ephemeral port)
    pub port: u16,

    /// Number of worker threads
    pub threads: usize,

    /// Queued request tasks allowed per worker before submission blocks
    pub queue_depth_per_thread: usize,

    /// Fixed request buffer size (per worker thread)
    pub request_buffer_size: usize,

    /// SO_SNDBUF / SO_RCVBUF applied to accepted sockets
    pub socket_buffer_size: usize,

    /// TCP nodelay
    pub tcp_nodelay: bool,

    /// Upper bound on assembling one request, and on how long a response
    /// may stall on a peer that stops reading; None waits forever
    pub request_timeout_ms: Option<u64>,

    /// Grace period for each phase of pool shutdown
    pub shutdown_grace_ms: u64,

    /// Reactor poll timeout, bounds how late a shutdown is noticed
    pub poll_interval_ms: u64,

    /// Text file to serve
    pub text_path: Option<PathBuf>,

    /// Log level for the `text_line_server` target (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 10322,
            threads: default_threads(),
            queue_depth_per_thread: 16,
            request_buffer_size: 4096,
            socket_buffer_size: 64 * 1024, // 64KB
            tcp_nodelay: true,
            request_timeout_ms: Some(60_000),
            shutdown_grace_ms: 1000,
            poll_interval_ms: 100,
            text_path: None,
            log_level: "info".to_string(),
        }
    }
}

/// Half of the available CPUs, at least one
pub fn default_threads() -> usize {
    (num_cpus::get() / 2).max(1)
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use text_line_server::Config;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::from_file("server.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.threads == 0 {
            anyhow::bail!("threads must be > 0");
        }

        if self.queue_depth_per_thread == 0 {
            anyhow::bail!("queue_depth_per_thread must be > 0");
        }

        // Must at least hold "GET <i64>\r\n"
        if self.request_buffer_size < 32 {
            anyhow::bail!("request_buffer_size must be >= 32");
        }

        if self.socket_buffer_size == 0 {
            anyhow::bail!("socket_buffer_size must be > 0");
        }

        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be > 0");
        }

        if self.text_path.is_none() {
            anyhow::bail!("text_path is required");
        }

        Ok(())
    }

    /// Bounded capacity of the worker queue
    pub fn queue_capacity(&self) -> usize {
        self.threads * self.queue_depth_per_thread
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
