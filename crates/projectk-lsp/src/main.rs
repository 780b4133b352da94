//! project_k Language Server.
//!
//! Usage:
//!   projectk-lsp              # Start LSP server (stdio)
//!   projectk-lsp --version    # Print version
//!   projectk-lsp --help       # Print help

use clap::Parser;
use projectk_lsp::ServerConfig;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "projectk-lsp", author, version, about, long_about = None)]
struct Args {
    /// Communicate over stdin/stdout (the only transport)
    #[arg(long)]
    stdio: bool,

    /// Worker threads for requests and diagnostics [default: available parallelism]
    #[arg(long, env = "PROJECTK_LSP_THREADS")]
    threads: Option<usize>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "PROJECTK_LSP_LOG", default_value = "projectk_lsp=info")]
    log_filter: String,

    /// Do not publish diagnostics
    #[arg(long)]
    no_diagnostics: bool,

    /// Do not advertise semantic tokens
    #[arg(long)]
    no_semantic_tokens: bool,
}

impl Args {
    fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::default();
        if let Some(threads) = self.threads {
            config.worker_threads = threads.max(1);
        }
        config.diagnostics = !self.no_diagnostics;
        config.semantic_tokens = !self.no_semantic_tokens;
        config
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing (logs to stderr, not stdout which is for LSP)
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| EnvFilter::try_new(&args.log_filter).ok())
        .unwrap_or_else(|| EnvFilter::new("projectk_lsp=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    if !args.stdio {
        tracing::debug!("No transport flag given, using stdio");
    }

    // Run the server
    match projectk_lsp::start_stdio(args.config()) {
        Ok(status) => status.into(),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
