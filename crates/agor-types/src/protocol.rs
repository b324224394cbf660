use serde::{Deserialize, Serialize};

// JSON-line wire protocol between the daemon and its clients (UI, CLI,
// executors). One frame per line; requests carry a client-chosen id echoed
// by the matching response. Event frames are pushed for subscribed
// channels and carry the channel's FIFO sequence number.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Request {
        id: u64,
        method: String,
        #[serde(default)]
        params: serde_json::Value,
    },
    Response {
        id: u64,
        result: serde_json::Value,
    },
    Error {
        id: u64,
        error: ErrorBody,
    },
    Event {
        channel: String,
        event: String,
        payload: serde_json::Value,
        seq: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// Error taxonomy carried on the wire. Clients branch on the kind, never
/// on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Unauthenticated,
    Validation,
    Aborted,
    PermissionDenied,
    Vendor,
    Transient,
    Internal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame::Request {
            id: 7,
            method: "sessions.get".into(),
            params: serde_json::json!({"session_id": "x"}),
        };
        let line = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&line).unwrap();
        assert!(matches!(back, Frame::Request { id: 7, .. }));
    }

    #[test]
    fn test_error_kind_wire_names() {
        let json = serde_json::to_string(&ErrorKind::PermissionDenied).unwrap();
        assert_eq!(json, "\"permission_denied\"");
    }
}
