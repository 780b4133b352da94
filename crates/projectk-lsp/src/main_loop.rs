//! Main event loop for the LSP server.
//!
//! Follows rust-analyzer's architecture:
//! - Notifications handled synchronously, in receipt order
//! - Read requests dispatched to a threadpool with a shared snapshot
//! - Cancellation suppresses the response at the hand-off to the emitter

use crate::config::ServerConfig;
use crate::db::AnalysisDb;
use crate::emitter::{DiagnosticsPublisher, Emitter};
use crate::error::{DocumentError, ProtocolError, ServerError};
use crate::handlers::completion::handle_completion;
use crate::handlers::definition::handle_goto_definition;
use crate::handlers::hover::handle_hover;
use crate::handlers::semantic_tokens::{
    get_capabilities as get_semantic_tokens_capabilities, handle_semantic_tokens,
};
use crate::pending::RequestQueue;
use crate::protocol::{ClientNotification, ClientRequest, Incoming, ReadRequest};
use crate::snapshot::Snapshot;
use crate::vfs::Vfs;
use crossbeam_channel::{Receiver, Sender};
use lsp_server::{ErrorCode, Message, RequestId, Response};
use lsp_types::request::{Initialize, Request as _};
use lsp_types::{
    CompletionOptions, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, HoverProviderCapability, InitializeParams, InitializeResult,
    OneOf, PositionEncodingKind, ServerCapabilities, ServerInfo, TextDocumentSyncCapability,
    TextDocumentSyncKind, TextDocumentSyncOptions, Uri,
};
use std::ops::ControlFlow;
use std::sync::Arc;

/// Events processed by the main loop.
#[derive(Debug)]
pub enum Event {
    /// A decoded message from the client.
    Message(Incoming),
    /// A message that could not be framed or decoded; dropped.
    Malformed(ProtocolError),
    /// The client closed its end of the input.
    InputClosed,
    /// Writing to the client failed.
    OutputFailed,
}

/// How the server process should end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Orderly shutdown.
    Success,
    /// `exit` without `shutdown`, or a broken connection.
    Failure,
}

impl ExitStatus {
    /// Process exit code.
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        Self::from(status.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Running,
    ShutDown,
}

/// State managed by the main loop.
pub struct MainLoopState {
    config: ServerConfig,
    lifecycle: Lifecycle,
    vfs: Arc<Vfs>,
    db: Arc<AnalysisDb>,
    emitter: Emitter,
    requests: Arc<RequestQueue>,
    publisher: Arc<DiagnosticsPublisher>,
    pool: rayon::ThreadPool,
}

impl MainLoopState {
    /// Create a new main loop state with its worker pool.
    pub fn new(sender: Sender<Message>, config: ServerConfig) -> Result<Self, ServerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads.max(1))
            .thread_name(|i| format!("projectk-worker-{i}"))
            .build()?;
        Ok(Self {
            config,
            lifecycle: Lifecycle::Uninitialized,
            vfs: Arc::new(Vfs::new()),
            db: Arc::new(AnalysisDb::new()),
            emitter: Emitter::new(sender),
            requests: Arc::new(RequestQueue::new()),
            publisher: Arc::new(DiagnosticsPublisher::new()),
            pool,
        })
    }

    /// The document store.
    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    /// The analysis database.
    pub fn db(&self) -> &AnalysisDb {
        &self.db
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(Arc::clone(&self.vfs), Arc::clone(&self.db))
    }

    /// Handle an incoming event.
    pub fn handle_event(&mut self, event: Event) -> ControlFlow<ExitStatus> {
        let outcome = match event {
            Event::Message(Incoming::Request(id, request)) => self
                .handle_request(id, request)
                .map(|()| ControlFlow::Continue(())),
            Event::Message(Incoming::Notification(notification)) => {
                self.handle_notification(notification)
            }
            Event::Message(Incoming::Response(response)) => {
                // We don't send requests to the client
                tracing::debug!("Ignoring response to {}", response.id);
                Ok(ControlFlow::Continue(()))
            }
            Event::Malformed(e) => {
                tracing::warn!("Dropping malformed message: {}", e);
                Ok(ControlFlow::Continue(()))
            }
            Event::InputClosed => {
                tracing::info!("Input closed, shutting down");
                Ok(ControlFlow::Break(ExitStatus::Success))
            }
            Event::OutputFailed => {
                tracing::error!("Output failed, shutting down");
                Ok(ControlFlow::Break(ExitStatus::Failure))
            }
        };
        outcome.unwrap_or_else(|e| {
            tracing::error!("Server error: {}", e);
            ControlFlow::Break(ExitStatus::Failure)
        })
    }

    /// Handle an LSP request (expects response).
    fn handle_request(&mut self, id: RequestId, request: ClientRequest) -> Result<(), ServerError> {
        match (self.lifecycle, request) {
            (Lifecycle::Uninitialized, ClientRequest::Initialize(params)) => {
                self.handle_initialize(id, *params)
            }
            (Lifecycle::Uninitialized, ClientRequest::Malformed { method, error })
                if method == Initialize::METHOD =>
            {
                self.respond_error(id, ErrorCode::InvalidParams, error)
            }
            (Lifecycle::Uninitialized, _) => self.respond_error(
                id,
                ErrorCode::ServerNotInitialized,
                "server not initialized".to_string(),
            ),
            (Lifecycle::ShutDown, _) => self.respond_error(
                id,
                ErrorCode::InvalidRequest,
                "shutdown already requested".to_string(),
            ),
            (Lifecycle::Running, ClientRequest::Initialize(_)) => self.respond_error(
                id,
                ErrorCode::InvalidRequest,
                "server already initialized".to_string(),
            ),
            (Lifecycle::Running, ClientRequest::Shutdown) => {
                tracing::info!("Shutdown requested");
                self.lifecycle = Lifecycle::ShutDown;
                self.emitter.respond(Response::new_ok(id, ()))
            }
            (Lifecycle::Running, ClientRequest::Read(ReadRequest::SemanticTokens(_)))
                if !self.config.semantic_tokens =>
            {
                self.respond_error(
                    id,
                    ErrorCode::MethodNotFound,
                    "semantic tokens are disabled".to_string(),
                )
            }
            (Lifecycle::Running, ClientRequest::Read(read)) => self.dispatch_read(id, read),
            (Lifecycle::Running, ClientRequest::Unknown(method)) => {
                tracing::warn!("Unhandled request: {}", method);
                self.respond_error(
                    id,
                    ErrorCode::MethodNotFound,
                    format!("Unhandled request: {method}"),
                )
            }
            (Lifecycle::Running, ClientRequest::Malformed { method, error }) => {
                tracing::warn!("Invalid params for {}: {}", method, error);
                self.respond_error(id, ErrorCode::InvalidParams, error)
            }
        }
    }

    /// Handle the initialize request.
    fn handle_initialize(&mut self, id: RequestId, params: InitializeParams) -> Result<(), ServerError> {
        if let Some(client) = &params.client_info {
            tracing::info!(
                "Client: {} {}",
                client.name,
                client.version.as_deref().unwrap_or("")
            );
        }
        self.config
            .apply_initialization_options(params.initialization_options);

        let result = InitializeResult {
            capabilities: self.capabilities(),
            server_info: Some(ServerInfo {
                name: "projectk-lsp".to_string(),
                version: Some(crate::VERSION.to_string()),
            }),
        };
        self.lifecycle = Lifecycle::Running;
        tracing::info!("LSP initialized successfully");
        self.emitter.respond(Response::new_ok(id, result))
    }

    fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            position_encoding: Some(PositionEncodingKind::UTF16),
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::INCREMENTAL),
                    ..Default::default()
                },
            )),
            hover_provider: Some(HoverProviderCapability::Simple(true)),
            completion_provider: Some(CompletionOptions::default()),
            definition_provider: Some(OneOf::Left(true)),
            semantic_tokens_provider: self
                .config
                .semantic_tokens
                .then(get_semantic_tokens_capabilities),
            ..Default::default()
        }
    }

    /// Queue a read request on the worker pool.
    fn dispatch_read(&self, id: RequestId, request: ReadRequest) -> Result<(), ServerError> {
        let uri = request.uri();
        let Some(version) = self.vfs.version(uri) else {
            let e = DocumentError::UnknownDocument(uri.as_str().to_string());
            tracing::warn!("{} for {}", e, request.method());
            return self
                .emitter
                .respond(Response {
                    id,
                    result: None,
                    error: Some(e.to_response_error()),
                });
        };

        self.requests.register(id.clone(), request.method(), version);
        let snapshot = self.snapshot();
        let requests = Arc::clone(&self.requests);
        let emitter = self.emitter.clone();
        self.pool.spawn(move || {
            if !requests.start(&id) {
                return;
            }
            let response = run_read(&snapshot, id.clone(), &request);
            if let Err(e) = requests.complete(&id, response, &emitter) {
                tracing::debug!("Dropping response to {}: {}", id, e);
            }
        });
        Ok(())
    }

    /// Handle an LSP notification.
    fn handle_notification(
        &self,
        notification: ClientNotification,
    ) -> Result<ControlFlow<ExitStatus>, ServerError> {
        if let ClientNotification::Exit = notification {
            tracing::info!("Exit notification received");
            let status = if self.lifecycle == Lifecycle::ShutDown {
                ExitStatus::Success
            } else {
                ExitStatus::Failure
            };
            return Ok(ControlFlow::Break(status));
        }
        if self.lifecycle == Lifecycle::Uninitialized {
            tracing::debug!("Dropping notification before initialize: {:?}", notification);
            return Ok(ControlFlow::Continue(()));
        }

        // Notifications are handled synchronously - this is critical for correctness
        match notification {
            ClientNotification::Initialized => tracing::info!("Client initialized"),
            ClientNotification::DidOpen(params) => self.on_did_open(params)?,
            ClientNotification::DidChange(params) => self.on_did_change(params)?,
            ClientNotification::DidClose(params) => self.on_did_close(params)?,
            ClientNotification::Cancel(id) => self.requests.cancel(&id),
            ClientNotification::Unknown(method) => {
                tracing::debug!("Unhandled notification: {}", method);
            }
            ClientNotification::Exit => {}
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Handle textDocument/didOpen notification.
    fn on_did_open(&self, params: DidOpenTextDocumentParams) -> Result<(), ServerError> {
        let document = params.text_document;
        let uri = document.uri;
        match self.vfs.open(
            uri.clone(),
            document.language_id,
            &document.text,
            document.version,
        ) {
            Ok(()) => {
                tracing::info!("Document opened: {}", uri.as_str());
                self.schedule_diagnostics(uri);
                Ok(())
            }
            Err(e) => self.report(&e),
        }
    }

    /// Handle textDocument/didChange notification.
    fn on_did_change(&self, params: DidChangeTextDocumentParams) -> Result<(), ServerError> {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        match self.vfs.change(&uri, version, &params.content_changes) {
            Ok(()) => {
                tracing::debug!("Document changed: {} (version {})", uri.as_str(), version);
                self.db.invalidate(&uri);
                self.schedule_diagnostics(uri);
                Ok(())
            }
            Err(e) => self.report(&e),
        }
    }

    /// Handle textDocument/didClose notification.
    fn on_did_close(&self, params: DidCloseTextDocumentParams) -> Result<(), ServerError> {
        let uri = params.text_document.uri;
        match self.vfs.close(&uri) {
            Ok(()) => {
                tracing::info!("Document closed: {}", uri.as_str());
                self.db.remove(&uri);
                self.publisher.clear(&uri, &self.emitter)
            }
            Err(e) => self.report(&e),
        }
    }

    /// Compute and publish diagnostics on the pool.
    fn schedule_diagnostics(&self, uri: Uri) {
        if !self.config.diagnostics {
            return;
        }
        let snapshot = self.snapshot();
        let publisher = Arc::clone(&self.publisher);
        let emitter = self.emitter.clone();
        self.pool.spawn(move || {
            let analysis = match snapshot.analysis(&uri) {
                Ok(analysis) => analysis,
                Err(e) => {
                    tracing::debug!("Skipping diagnostics: {}", e);
                    return;
                }
            };
            if let Err(e) = publisher.publish(snapshot.vfs(), &analysis, &emitter) {
                tracing::debug!("Dropping diagnostics for {}: {}", uri.as_str(), e);
            }
        });
    }

    /// Report a store error raised by a notification, which has no id to answer.
    fn report(&self, e: &DocumentError) -> Result<(), ServerError> {
        tracing::warn!("{}", e);
        self.emitter.show_error(e.to_string())
    }

    fn respond_error(&self, id: RequestId, code: ErrorCode, message: String) -> Result<(), ServerError> {
        self.emitter
            .respond(Response::new_err(id, code as i32, message))
    }
}

/// Compute the response to a read request.
fn run_read(snapshot: &Snapshot, id: RequestId, request: &ReadRequest) -> Response {
    let analysis = match snapshot.analysis(request.uri()) {
        Ok(analysis) => analysis,
        Err(e) => {
            return Response {
                id,
                result: None,
                error: Some(e.to_response_error()),
            };
        }
    };
    tracing::debug!(
        method = request.method(),
        version = analysis.version,
        "handling request"
    );

    let result = match request {
        ReadRequest::Hover(params) => serde_json::to_value(handle_hover(params, &analysis)),
        ReadRequest::Completion(params) => {
            serde_json::to_value(handle_completion(params, &analysis))
        }
        ReadRequest::Definition(params) => {
            serde_json::to_value(handle_goto_definition(params, &analysis))
        }
        ReadRequest::SemanticTokens(params) => {
            serde_json::to_value(handle_semantic_tokens(params, &analysis))
        }
    };
    match result {
        Ok(value) => Response {
            id,
            result: Some(value),
            error: None,
        },
        Err(e) => Response::new_err(id, ErrorCode::InternalError as i32, e.to_string()),
    }
}

/// Run the main event loop until exit.
pub fn run_main_loop(
    events: Receiver<Event>,
    sender: Sender<Message>,
    config: ServerConfig,
) -> Result<ExitStatus, ServerError> {
    let mut state = MainLoopState::new(sender, config)?;

    tracing::info!("Main loop started");

    for event in &events {
        if let ControlFlow::Break(status) = state.handle_event(event) {
            tracing::info!("Main loop ended ({:?})", status);
            return Ok(status);
        }
    }

    tracing::info!("Main loop ended (event channel closed)");
    Ok(ExitStatus::Success)
}
