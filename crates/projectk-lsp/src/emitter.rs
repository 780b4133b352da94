//! Outgoing responses and notifications.
//!
//! Everything the server says goes through an unbounded channel to the
//! writer thread, so sending never blocks the dispatcher.

use crate::db::Analysis;
use crate::error::ServerError;
use crate::handlers::diagnostics::{clear_params, publish_params};
use crate::vfs::Vfs;
use crossbeam_channel::Sender;
use lsp_server::{Message, Notification, Response};
use lsp_types::notification::{Notification as _, PublishDiagnostics, ShowMessage};
use lsp_types::{MessageType, ShowMessageParams, Uri};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Cloneable handle on the outgoing message channel.
#[derive(Debug, Clone)]
pub struct Emitter {
    sender: Sender<Message>,
}

impl Emitter {
    /// Wrap the writer thread's channel.
    pub const fn new(sender: Sender<Message>) -> Self {
        Self { sender }
    }

    /// Send a response.
    pub fn respond(&self, response: Response) -> Result<(), ServerError> {
        self.send(Message::Response(response))
    }

    /// Send a notification.
    pub fn notify<N: lsp_types::notification::Notification>(
        &self,
        params: N::Params,
    ) -> Result<(), ServerError> {
        self.send(Message::Notification(Notification::new(
            N::METHOD.to_string(),
            params,
        )))
    }

    /// Show an error message in the client.
    pub fn show_error(&self, message: String) -> Result<(), ServerError> {
        self.notify::<ShowMessage>(ShowMessageParams {
            typ: MessageType::ERROR,
            message,
        })
    }

    fn send(&self, message: Message) -> Result<(), ServerError> {
        self.sender.send(message).map_err(|_| {
            tracing::error!("Failed to send message: writer is gone");
            ServerError::ConnectionClosed
        })
    }
}

/// Last diagnostics version published per document.
///
/// Diagnostics jobs finish in any order; only a result newer than what the
/// client already has, for the opening of the document that is current,
/// goes out.
#[derive(Debug, Default)]
pub struct DiagnosticsPublisher {
    /// `(epoch, version)` last sent per URI.
    published: Mutex<HashMap<Uri, (u64, i32)>>,
}

impl DiagnosticsPublisher {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the diagnostics of `analysis` if they are the freshest.
    ///
    /// Returns whether anything was sent.
    pub fn publish(
        &self,
        vfs: &Vfs,
        analysis: &Analysis,
        emitter: &Emitter,
    ) -> Result<bool, ServerError> {
        let mut published = self.published.lock();
        if vfs.epoch(&analysis.uri) != Some(analysis.epoch) {
            tracing::debug!(
                uri = analysis.uri.as_str(),
                epoch = analysis.epoch,
                "skipping diagnostics of a closed document"
            );
            return Ok(false);
        }
        if published
            .get(&analysis.uri)
            .is_some_and(|&(epoch, version)| epoch == analysis.epoch && version >= analysis.version)
        {
            tracing::debug!(
                uri = analysis.uri.as_str(),
                version = analysis.version,
                "skipping stale diagnostics"
            );
            return Ok(false);
        }
        published.insert(analysis.uri.clone(), (analysis.epoch, analysis.version));
        emitter.notify::<PublishDiagnostics>(publish_params(analysis))?;
        Ok(true)
    }

    /// Clear a closed document's diagnostics in the client.
    pub fn clear(&self, uri: &Uri, emitter: &Emitter) -> Result<(), ServerError> {
        let mut published = self.published.lock();
        published.remove(uri);
        emitter.notify::<PublishDiagnostics>(clear_params(uri.clone()))
    }

    /// Last version published for `uri`.
    pub fn published_version(&self, uri: &Uri) -> Option<i32> {
        self.published.lock().get(uri).map(|&(_, version)| version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use projectk_syntax::parse;
    use std::sync::Arc;

    fn uri() -> Uri {
        "file:///test.pk".parse().unwrap()
    }

    fn analysis(vfs: &Vfs, source: &str, version: i32) -> Analysis {
        let epoch = vfs.epoch(&uri()).unwrap_or_default();
        Analysis::new(uri(), version, Arc::from(source), &parse(source)).with_epoch(epoch)
    }

    #[test]
    fn test_show_error() {
        let (sender, receiver) = unbounded();
        let emitter = Emitter::new(sender);
        emitter.show_error("boom".to_string()).unwrap();

        match receiver.try_recv().unwrap() {
            Message::Notification(notification) => {
                assert_eq!(notification.method, "window/showMessage");
                assert_eq!(notification.params["type"], 1);
                assert_eq!(notification.params["message"], "boom");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_send_after_writer_gone() {
        let (sender, receiver) = unbounded();
        drop(receiver);
        let emitter = Emitter::new(sender);
        assert!(matches!(
            emitter.respond(Response::new_ok(lsp_server::RequestId::from(1), ())),
            Err(ServerError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_publish_only_newer_versions() {
        let (sender, receiver) = unbounded();
        let emitter = Emitter::new(sender);
        let vfs = Vfs::new();
        vfs.open(uri(), "project_k".to_string(), "let x = ;", 3).unwrap();
        let publisher = DiagnosticsPublisher::new();

        assert!(publisher.publish(&vfs, &analysis(&vfs, "let x = ;", 3), &emitter).unwrap());
        assert!(!publisher.publish(&vfs, &analysis(&vfs, "let x = 1;", 2), &emitter).unwrap());
        assert!(!publisher.publish(&vfs, &analysis(&vfs, "let x = ;", 3), &emitter).unwrap());
        assert_eq!(publisher.published_version(&uri()), Some(3));
        assert_eq!(receiver.try_iter().count(), 1);
    }

    #[test]
    fn test_no_publish_after_close() {
        let (sender, receiver) = unbounded();
        let emitter = Emitter::new(sender);
        let vfs = Vfs::new();
        vfs.open(uri(), "project_k".to_string(), "x;", 1).unwrap();
        let publisher = DiagnosticsPublisher::new();
        let late = analysis(&vfs, "x;", 1);

        vfs.close(&uri()).unwrap();
        publisher.clear(&uri(), &emitter).unwrap();
        assert!(!publisher.publish(&vfs, &late, &emitter).unwrap());

        let messages: Vec<_> = receiver.try_iter().collect();
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            Message::Notification(notification) => {
                assert_eq!(notification.params["diagnostics"], serde_json::json!([]));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_late_diagnostics_of_closed_document_are_dropped_after_reopen() {
        let (sender, receiver) = unbounded();
        let emitter = Emitter::new(sender);
        let vfs = Vfs::new();
        vfs.open(uri(), "project_k".to_string(), "let old = ;", 5).unwrap();
        let publisher = DiagnosticsPublisher::new();
        let late = analysis(&vfs, "let old = ;", 5);

        vfs.close(&uri()).unwrap();
        publisher.clear(&uri(), &emitter).unwrap();
        vfs.open(uri(), "project_k".to_string(), "let fresh = ;", 1).unwrap();

        assert!(!publisher.publish(&vfs, &late, &emitter).unwrap());
        let fresh = analysis(&vfs, "let fresh = ;", 1);
        assert!(publisher.publish(&vfs, &fresh, &emitter).unwrap());
        assert_eq!(publisher.published_version(&uri()), Some(1));

        let messages: Vec<_> = receiver.try_iter().collect();
        assert_eq!(messages.len(), 2);
        match &messages[1] {
            Message::Notification(notification) => {
                assert_eq!(notification.params["version"], 1);
                assert_eq!(notification.params["diagnostics"].as_array().unwrap().len(), 1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
