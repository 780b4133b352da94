//! `Content-Length` framing over byte streams.
//!
//! The reader side is more forgiving than `lsp_server`'s: malformed frames
//! are reported and skipped instead of tearing the connection down.

use crate::error::{ProtocolError, ServerError};
use crate::main_loop::Event;
use crate::protocol::{self, ClientNotification, Incoming};
use crossbeam_channel::{Receiver, Sender};
use lsp_server::Message;
use std::io::{self, BufRead, Read, Write};
use std::thread::{self, JoinHandle};

/// Largest body the reader accepts.
pub const MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

const CONTENT_LENGTH: &str = "content-length";

/// Read one framed message.
///
/// `Ok(None)` means the input ended; `Err` is an unrecoverable I/O failure.
/// Framing and payload problems come back as `Ok(Some(Err(_)))` with the
/// offending frame consumed.
pub fn read_message<R: BufRead>(
    reader: &mut R,
) -> io::Result<Option<Result<Message, ProtocolError>>> {
    let mut content_length: Option<Result<usize, ProtocolError>> = None;
    let mut malformed: Option<ProtocolError> = None;
    let mut seen_header = false;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf);
        let mut line = line.trim_end_matches(|c| c == '\r' || c == '\n');

        if line.is_empty() {
            if seen_header {
                break;
            }
            continue;
        }

        // Resynchronize when junk precedes a header on the same line.
        if let Some(at) = line.to_ascii_lowercase().find(CONTENT_LENGTH) {
            if at > 0 {
                tracing::warn!("Skipping {} bytes of garbage before header", at);
                line = &line[at..];
                content_length = None;
                malformed = None;
            }
        }
        seen_header = true;

        let Some((name, value)) = line.split_once(':') else {
            malformed.get_or_insert(ProtocolError::MalformedHeader(line.to_string()));
            continue;
        };
        if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
            let value = value.trim();
            content_length = Some(
                value
                    .parse::<usize>()
                    .map_err(|_| ProtocolError::InvalidContentLength(value.to_string())),
            );
        }
        // Content-Type and unknown headers are ignored.
    }

    let length = match content_length {
        Some(Ok(length)) => length,
        Some(Err(e)) => return Ok(Some(Err(e))),
        None => return Ok(Some(Err(ProtocolError::MissingContentLength))),
    };

    if length > MAX_BODY_SIZE {
        let skipped = io::copy(&mut reader.by_ref().take(length as u64), &mut io::sink())?;
        if skipped < length as u64 {
            return Ok(None);
        }
        return Ok(Some(Err(ProtocolError::TooLarge {
            size: length,
            limit: MAX_BODY_SIZE,
        })));
    }

    let mut body = vec![0; length];
    match reader.read_exact(&mut body) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    if let Some(e) = malformed {
        return Ok(Some(Err(e)));
    }
    let Ok(body) = String::from_utf8(body) else {
        return Ok(Some(Err(ProtocolError::InvalidUtf8)));
    };
    tracing::trace!("< {}", body);
    Ok(Some(serde_json::from_str(&body).map_err(ProtocolError::from)))
}

/// Write one framed message and flush.
pub fn write_message<W: Write>(writer: &mut W, message: Message) -> io::Result<()> {
    message.write(writer)
}

/// Handles of the reader and writer threads.
pub struct IoThreads {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl IoThreads {
    /// Wait for the writer to drain. The reader is joined only if it has
    /// already stopped, since it may be blocked on input that never comes.
    pub fn join(self) -> Result<(), ServerError> {
        self.writer
            .join()
            .map_err(|_| io::Error::other("writer thread panicked"))?;
        if self.reader.is_finished() {
            self.reader
                .join()
                .map_err(|_| io::Error::other("reader thread panicked"))?;
        }
        Ok(())
    }
}

/// Spawn the reader and writer threads.
///
/// The reader decodes messages into `events` until the input ends or an
/// `exit` notification has been forwarded. The writer drains `messages`
/// until every sender is dropped.
pub fn spawn<R, W>(
    input: R,
    output: W,
    events: Sender<Event>,
    messages: Receiver<Message>,
) -> Result<IoThreads, ServerError>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    let reader = spawn_reader(input, events.clone())?;
    let writer = spawn_writer(output, messages, events)?;
    Ok(IoThreads { reader, writer })
}

fn spawn_reader<R>(mut input: R, events: Sender<Event>) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("projectk-reader".to_string())
        .spawn(move || loop {
            let event = match read_message(&mut input) {
                Ok(Some(Ok(message))) => match protocol::decode(message) {
                    Ok(incoming) => Event::Message(incoming),
                    Err(e) => Event::Malformed(e),
                },
                Ok(Some(Err(e))) => Event::Malformed(e),
                Ok(None) => {
                    tracing::info!("Input closed");
                    let _ = events.send(Event::InputClosed);
                    return;
                }
                Err(e) => {
                    tracing::error!("Failed to read from client: {}", e);
                    let _ = events.send(Event::InputClosed);
                    return;
                }
            };
            let is_exit = matches!(
                event,
                Event::Message(Incoming::Notification(ClientNotification::Exit))
            );
            if events.send(event).is_err() || is_exit {
                return;
            }
        })
}

fn spawn_writer<W>(
    mut output: W,
    messages: Receiver<Message>,
    events: Sender<Event>,
) -> io::Result<JoinHandle<()>>
where
    W: Write + Send + 'static,
{
    thread::Builder::new()
        .name("projectk-writer".to_string())
        .spawn(move || {
            for message in messages {
                if let Err(e) = write_message(&mut output, message) {
                    tracing::error!("Failed to write to client: {}", e);
                    let _ = events.send(Event::OutputFailed);
                    return;
                }
            }
        })
}
