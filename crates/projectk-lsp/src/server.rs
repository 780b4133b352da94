//! Server startup: wires the transport threads to the main loop.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::main_loop::{run_main_loop, ExitStatus};
use crate::transport;
use std::io::{self, BufRead, BufReader, Write};

/// The LSP server.
#[derive(Debug, Clone)]
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Create a server with the given startup configuration.
    pub const fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Serve one client over `input` and `output` until it exits or
    /// disconnects.
    pub fn run<R, W>(self, input: R, output: W) -> Result<ExitStatus, ServerError>
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        tracing::info!("Starting project_k Language Server v{}", crate::VERSION);
        tracing::debug!(config = ?self.config, "startup configuration");

        let (event_sender, event_receiver) = crossbeam_channel::unbounded();
        let (message_sender, message_receiver) = crossbeam_channel::unbounded();
        let io_threads = transport::spawn(input, output, event_sender, message_receiver)?;

        let status = run_main_loop(event_receiver, message_sender, self.config)?;

        // Wait for the writer to flush what is left
        io_threads.join()?;

        tracing::info!("Server shutdown complete");
        Ok(status)
    }
}

/// Start the LSP server using stdio transport.
pub fn start_stdio(config: ServerConfig) -> Result<ExitStatus, ServerError> {
    tracing::info!("Starting LSP server on stdio");
    Server::new(config).run(BufReader::new(io::stdin()), io::stdout())
}
