use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use text_line_server::config::default_threads;
use text_line_server::{Config, Server};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Text file to serve
    text_path: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value_t = 10322)]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// Number of worker threads (0 = half the number of CPUs)
    #[arg(short = 't', long, default_value_t = 0)]
    threads: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Create configuration
    let mut config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        let threads = if args.threads == 0 {
            default_threads()
        } else {
            args.threads
        };

        Config {
            bind_addr: args.bind,
            port: args.port,
            threads,
            ..Default::default()
        }
    };
    config.text_path = Some(args.text_path.clone());
    if args.verbose {
        config.log_level = "debug".to_string();
    } else if let Some(level) = args.log_level {
        config.log_level = level;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(format!("text_line_server={}", config.log_level))
        .init();

    if !args.text_path.is_file() {
        error!("Text file '{}' does not exist", args.text_path.display());
        anyhow::bail!("text file '{}' does not exist", args.text_path.display());
    }

    info!(
        "Starting text line server v{} on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.bind_addr,
        config.port
    );
    info!(
        "Detected {} CPUs, using {} worker threads",
        num_cpus::get(),
        config.threads
    );

    // Index is brought up to date here, before anything is served
    let server = Arc::new(Server::new(config)?);
    info!("Index ready for {}", server.text_path().display());

    // Setup signal handlers for graceful shutdown
    let server_clone = Arc::clone(&server);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, shutting down gracefully...");
        server_clone.shutdown();
    })?;

    // Run the server
    if let Err(e) = server.run() {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
