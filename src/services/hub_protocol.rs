//! SignalR JSON hub protocol framing
//!
//! Every message is a JSON object terminated by the 0x1E record separator. A
//! single websocket frame may carry several records.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::domain::ClientError;

pub const RECORD_SEPARATOR: char = '\u{1e}';

const INVOCATION: u8 = 1;
const PING: u8 = 6;
const CLOSE: u8 = 7;

#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Invocation { target: String, arguments: Vec<Value> },
    Ping,
    Close { error: Option<String>, allow_reconnect: bool },
    /// Completions, stream items and anything else this client ignores
    Other(u8),
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: u8,
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    error: Option<String>,
    #[serde(rename = "allowReconnect", default)]
    allow_reconnect: bool,
}

#[derive(Debug, Deserialize)]
struct HandshakeReply {
    error: Option<String>,
}

pub fn handshake_request() -> String {
    frame(json!({ "protocol": "json", "version": 1 }))
}

pub fn ping() -> String {
    frame(json!({ "type": PING }))
}

/// Fire-and-forget invocation of a hub method
pub fn invocation(target: &str, arguments: &[&str]) -> String {
    frame(json!({
        "type": INVOCATION,
        "target": target,
        "arguments": arguments,
    }))
}

/// Non-empty records in a text frame
pub fn split_records(text: &str) -> impl Iterator<Item = &str> {
    text.split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|record| !record.is_empty())
}

/// Check the server's handshake reply (`{}` on success)
pub fn parse_handshake(record: &str) -> Result<(), ClientError> {
    let reply: HandshakeReply = serde_json::from_str(record)
        .map_err(|e| ClientError::Subscription(format!("Bad handshake reply: {}", e)))?;
    match reply.error {
        Some(error) => Err(ClientError::Subscription(format!(
            "Handshake rejected: {}",
            error
        ))),
        None => Ok(()),
    }
}

pub fn parse_message(record: &str) -> Result<HubMessage, ClientError> {
    let raw: RawMessage = serde_json::from_str(record)?;
    Ok(match raw.kind {
        INVOCATION => HubMessage::Invocation {
            target: raw.target.unwrap_or_default(),
            arguments: raw.arguments,
        },
        PING => HubMessage::Ping,
        CLOSE => HubMessage::Close {
            error: raw.error,
            allow_reconnect: raw.allow_reconnect,
        },
        other => HubMessage::Other(other),
    })
}

/// First argument rendered as a plain string
pub fn first_argument_text(arguments: &[Value]) -> String {
    match arguments.first() {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn frame(value: Value) -> String {
    let mut text = value.to_string();
    text.push(RECORD_SEPARATOR);
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_request_is_terminated() {
        let request = handshake_request();
        assert!(request.ends_with(RECORD_SEPARATOR));
        let body: Value = serde_json::from_str(request.trim_end_matches(RECORD_SEPARATOR)).unwrap();
        assert_eq!(body, json!({ "protocol": "json", "version": 1 }));
    }

    #[test]
    fn test_handshake_reply() {
        assert!(parse_handshake("{}").is_ok());
        assert!(matches!(
            parse_handshake(r#"{"error":"Requested protocol 'json' is not available."}"#),
            Err(ClientError::Subscription(_))
        ));
    }

    #[test]
    fn test_invocation_frame() {
        let text = invocation("NotifyBookUpdate", &["A book has been borrowed!"]);
        let records: Vec<&str> = split_records(&text).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(
            parse_message(records[0]).unwrap(),
            HubMessage::Invocation {
                target: "NotifyBookUpdate".to_string(),
                arguments: vec![json!("A book has been borrowed!")],
            }
        );
    }

    #[test]
    fn test_several_records_in_one_frame() {
        let text = "{}\u{1e}{\"type\":6}\u{1e}{\"type\":1,\"target\":\"ReceiveBookUpdate\",\"arguments\":[\"x\"]}\u{1e}";
        let records: Vec<&str> = split_records(text).collect();
        assert_eq!(records.len(), 3);
        assert!(parse_handshake(records[0]).is_ok());
        assert_eq!(parse_message(records[1]).unwrap(), HubMessage::Ping);
        assert!(matches!(
            parse_message(records[2]).unwrap(),
            HubMessage::Invocation { ref target, .. } if target == "ReceiveBookUpdate"
        ));
    }

    #[test]
    fn test_close_and_unknown_messages() {
        assert_eq!(
            parse_message(r#"{"type":7,"error":"Server shutting down","allowReconnect":true}"#)
                .unwrap(),
            HubMessage::Close {
                error: Some("Server shutting down".to_string()),
                allow_reconnect: true,
            }
        );
        assert_eq!(
            parse_message(r#"{"type":3,"invocationId":"1"}"#).unwrap(),
            HubMessage::Other(3)
        );
        assert!(parse_message("not json").is_err());
    }

    #[test]
    fn test_first_argument_text() {
        assert_eq!(first_argument_text(&[json!("hello")]), "hello");
        assert_eq!(first_argument_text(&[json!({"bookId": 3})]), r#"{"bookId":3}"#);
        assert_eq!(first_argument_text(&[]), "");
    }
}
