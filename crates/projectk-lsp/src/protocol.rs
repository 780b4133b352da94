//! Decoding of raw JSON-RPC messages into closed enums.
//!
//! Everything past the transport layer matches on these types instead of
//! method strings.

use crate::error::ProtocolError;
use lsp_server::{Message, RequestId, Response};
use lsp_types::notification::{
    Cancel, DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument, Exit, Initialized,
    Notification as _,
};
use lsp_types::request::{
    Completion, GotoDefinition, HoverRequest, Initialize, Request as _, SemanticTokensFullRequest,
    Shutdown,
};
use lsp_types::{
    CompletionParams, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, GotoDefinitionParams, HoverParams, InitializeParams,
    NumberOrString, SemanticTokensParams, Uri,
};
use serde::de::DeserializeOwned;

/// A decoded message from the client.
#[derive(Debug)]
pub enum Incoming {
    /// A request expecting exactly one response.
    Request(RequestId, ClientRequest),
    /// A notification.
    Notification(ClientNotification),
    /// A response to a server-initiated request.
    Response(Response),
}

/// Requests the server understands.
#[derive(Debug)]
pub enum ClientRequest {
    /// `initialize`
    Initialize(Box<InitializeParams>),
    /// `shutdown`
    Shutdown,
    /// A request answered from a document analysis.
    Read(ReadRequest),
    /// A method the server does not implement.
    Unknown(String),
    /// A known method whose params did not decode.
    Malformed {
        /// The method name.
        method: String,
        /// The decoding error.
        error: String,
    },
}

/// Requests that read one document's analysis and run on the worker pool.
#[derive(Debug, Clone)]
pub enum ReadRequest {
    /// `textDocument/hover`
    Hover(HoverParams),
    /// `textDocument/completion`
    Completion(CompletionParams),
    /// `textDocument/definition`
    Definition(GotoDefinitionParams),
    /// `textDocument/semanticTokens/full`
    SemanticTokens(SemanticTokensParams),
}

impl ReadRequest {
    /// The document this request reads.
    pub fn uri(&self) -> &Uri {
        match self {
            Self::Hover(params) => &params.text_document_position_params.text_document.uri,
            Self::Completion(params) => &params.text_document_position.text_document.uri,
            Self::Definition(params) => &params.text_document_position_params.text_document.uri,
            Self::SemanticTokens(params) => &params.text_document.uri,
        }
    }

    /// The JSON-RPC method name.
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Hover(_) => HoverRequest::METHOD,
            Self::Completion(_) => Completion::METHOD,
            Self::Definition(_) => GotoDefinition::METHOD,
            Self::SemanticTokens(_) => SemanticTokensFullRequest::METHOD,
        }
    }
}

/// Notifications the server understands.
#[derive(Debug)]
pub enum ClientNotification {
    /// `initialized`
    Initialized,
    /// `exit`
    Exit,
    /// `textDocument/didOpen`
    DidOpen(DidOpenTextDocumentParams),
    /// `textDocument/didChange`
    DidChange(DidChangeTextDocumentParams),
    /// `textDocument/didClose`
    DidClose(DidCloseTextDocumentParams),
    /// `$/cancelRequest`
    Cancel(RequestId),
    /// Any other notification; ignored.
    Unknown(String),
}

/// Decode a framed message.
pub fn decode(message: Message) -> Result<Incoming, ProtocolError> {
    match message {
        Message::Request(request) => Ok(decode_request(request)),
        Message::Notification(notification) => {
            decode_notification(notification).map(Incoming::Notification)
        }
        Message::Response(response) => Ok(Incoming::Response(response)),
    }
}

fn from_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(params)
}

fn decode_request(request: lsp_server::Request) -> Incoming {
    let lsp_server::Request { id, method, params } = request;
    let decoded = match method.as_str() {
        Initialize::METHOD => {
            from_params::<InitializeParams>(params).map(|p| ClientRequest::Initialize(Box::new(p)))
        }
        Shutdown::METHOD => Ok(ClientRequest::Shutdown),
        HoverRequest::METHOD => from_params(params).map(|p| ClientRequest::Read(ReadRequest::Hover(p))),
        Completion::METHOD => {
            from_params(params).map(|p| ClientRequest::Read(ReadRequest::Completion(p)))
        }
        GotoDefinition::METHOD => {
            from_params(params).map(|p| ClientRequest::Read(ReadRequest::Definition(p)))
        }
        SemanticTokensFullRequest::METHOD => {
            from_params(params).map(|p| ClientRequest::Read(ReadRequest::SemanticTokens(p)))
        }
        other => Ok(ClientRequest::Unknown(other.to_string())),
    };
    let request = decoded.unwrap_or_else(|e| ClientRequest::Malformed {
        method,
        error: e.to_string(),
    });
    Incoming::Request(id, request)
}

fn decode_notification(
    notification: lsp_server::Notification,
) -> Result<ClientNotification, ProtocolError> {
    let lsp_server::Notification { method, params } = notification;
    let invalid = |e: serde_json::Error| ProtocolError::InvalidParams {
        method: method.clone(),
        message: e.to_string(),
    };
    let decoded = match method.as_str() {
        Initialized::METHOD => ClientNotification::Initialized,
        Exit::METHOD => ClientNotification::Exit,
        DidOpenTextDocument::METHOD => ClientNotification::DidOpen(from_params(params).map_err(invalid)?),
        DidChangeTextDocument::METHOD => {
            ClientNotification::DidChange(from_params(params).map_err(invalid)?)
        }
        DidCloseTextDocument::METHOD => {
            ClientNotification::DidClose(from_params(params).map_err(invalid)?)
        }
        Cancel::METHOD => {
            let params: lsp_types::CancelParams = from_params(params).map_err(invalid)?;
            let id = match params.id {
                NumberOrString::Number(n) => RequestId::from(n),
                NumberOrString::String(s) => RequestId::from(s),
            };
            ClientNotification::Cancel(id)
        }
        other => ClientNotification::Unknown(other.to_string()),
    };
    Ok(decoded)
}
