//! Tests for `Content-Length` framing.
//!
//! Every malformed frame must be reported and skipped without losing the
//! frames after it.

use lsp_server::{Message, Notification};
use projectk_lsp::transport::{read_message, write_message, MAX_BODY_SIZE};
use projectk_lsp::ProtocolError;
use std::io::{BufReader, Cursor};

fn frame(body: &str) -> Vec<u8> {
    format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
}

const INITIALIZED: &str = r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#;

fn reader(bytes: Vec<u8>) -> BufReader<Cursor<Vec<u8>>> {
    BufReader::new(Cursor::new(bytes))
}

fn expect_initialized(result: Option<Result<Message, ProtocolError>>) {
    match result {
        Some(Ok(Message::Notification(notification))) => {
            assert_eq!(notification.method, "initialized");
        }
        other => panic!("expected the initialized notification, got {other:?}"),
    }
}

// ============================================================================
// Well-formed input
// ============================================================================

#[test]
fn test_consecutive_frames() {
    let mut bytes = frame(INITIALIZED);
    bytes.extend(frame(INITIALIZED));
    let mut input = reader(bytes);

    expect_initialized(read_message(&mut input).unwrap());
    expect_initialized(read_message(&mut input).unwrap());
    assert!(read_message(&mut input).unwrap().is_none());
}

#[test]
fn test_extra_headers_ignored() {
    let body = INITIALIZED;
    let bytes = format!(
        "Content-Type: application/vscode-jsonrpc; charset=utf-8\r\nContent-Length: {}\r\nX-Custom: 1\r\n\r\n{}",
        body.len(),
        body
    );
    let mut input = reader(bytes.into_bytes());
    expect_initialized(read_message(&mut input).unwrap());
}

#[test]
fn test_write_then_read() {
    let mut out = Vec::new();
    let message = Message::Notification(Notification::new(
        "window/showMessage".to_string(),
        serde_json::json!({"type": 1, "message": "ü"}),
    ));
    write_message(&mut out, message).unwrap();

    let text = String::from_utf8(out.clone()).unwrap();
    assert!(text.starts_with("Content-Length: "));

    match read_message(&mut reader(out)).unwrap() {
        Some(Ok(Message::Notification(notification))) => {
            assert_eq!(notification.params["message"], "ü");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

// ============================================================================
// Recovery from malformed frames
// ============================================================================

#[test]
fn test_garbage_before_header() {
    let mut bytes = b"junk".to_vec();
    bytes.extend(frame(INITIALIZED));
    let mut input = reader(bytes);
    expect_initialized(read_message(&mut input).unwrap());
}

#[test]
fn test_missing_content_length() {
    let mut bytes = b"Content-Type: application/json\r\n\r\n".to_vec();
    bytes.extend(frame(INITIALIZED));
    let mut input = reader(bytes);

    assert!(matches!(
        read_message(&mut input).unwrap(),
        Some(Err(ProtocolError::MissingContentLength))
    ));
    expect_initialized(read_message(&mut input).unwrap());
}

#[test]
fn test_invalid_content_length() {
    let mut bytes = b"Content-Length: twelve\r\n\r\n".to_vec();
    bytes.extend(frame(INITIALIZED));
    let mut input = reader(bytes);

    assert!(matches!(
        read_message(&mut input).unwrap(),
        Some(Err(ProtocolError::InvalidContentLength(value))) if value == "twelve"
    ));
    expect_initialized(read_message(&mut input).unwrap());
}

#[test]
fn test_invalid_utf8_body() {
    let mut bytes = b"Content-Length: 3\r\n\r\n".to_vec();
    bytes.extend([0xff, 0xfe, 0xfd]);
    bytes.extend(frame(INITIALIZED));
    let mut input = reader(bytes);

    assert!(matches!(
        read_message(&mut input).unwrap(),
        Some(Err(ProtocolError::InvalidUtf8))
    ));
    expect_initialized(read_message(&mut input).unwrap());
}

#[test]
fn test_invalid_json_body() {
    let mut bytes = frame("{not json}");
    bytes.extend(frame(INITIALIZED));
    let mut input = reader(bytes);

    assert!(matches!(
        read_message(&mut input).unwrap(),
        Some(Err(ProtocolError::InvalidJson(_)))
    ));
    expect_initialized(read_message(&mut input).unwrap());
}

#[test]
fn test_oversized_body_is_skipped() {
    let size = MAX_BODY_SIZE + 1;
    let mut bytes = format!("Content-Length: {size}\r\n\r\n").into_bytes();
    bytes.resize(bytes.len() + size, b' ');
    bytes.extend(frame(INITIALIZED));
    let mut input = reader(bytes);

    assert!(matches!(
        read_message(&mut input).unwrap(),
        Some(Err(ProtocolError::TooLarge { size: s, .. })) if s == size
    ));
    expect_initialized(read_message(&mut input).unwrap());
}

#[test]
fn test_truncated_body_is_end_of_input() {
    let bytes = b"Content-Length: 100\r\n\r\n{\"jsonrpc\"".to_vec();
    assert!(read_message(&mut reader(bytes)).unwrap().is_none());
}
