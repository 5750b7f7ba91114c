// rust_core/src/error.rs
// One error type for the whole client. Transport problems are recoverable
// (the session degrades to polling), request problems are shown to the user.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

/// Shown when the server did not send a usable message.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        body: Option<ApiErrorBody>,
    },
    #[error("unauthorized")]
    Unauthorized,
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed stomp frame: {0}")]
    Frame(String),
    #[error("server sent ERROR frame: {0}")]
    Stomp(String),
    #[error("failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no heartbeat from server")]
    HeartbeatTimeout,
    #[error("not connected")]
    NotConnected,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// The text a player sees. Server messages are passed through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { message, .. } if !message.trim().is_empty() => message.clone(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    /// Errors that mean "the pipe broke", as opposed to "the server said no".
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Http(_)
                | ClientError::WebSocket(_)
                | ClientError::Frame(_)
                | ClientError::HeartbeatTimeout
                | ClientError::NotConnected
                | ClientError::Io(_)
        )
    }

    /// Builds an `Api` error from a non-2xx response body.
    pub fn from_response(status: u16, raw: &str) -> Self {
        match serde_json::from_str::<ApiErrorBody>(raw) {
            Ok(body) => ClientError::Api {
                status,
                message: body.message.clone().unwrap_or_default(),
                body: Some(body),
            },
            Err(_) => ClientError::Api {
                status,
                message: String::new(),
                body: None,
            },
        }
    }
}

/// The JSON body the match server returns for rejected requests.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiErrorBody {
    pub timestamp: Option<String>,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub message: Option<String>,
    pub path: Option<String>,
    pub details: HashMap<String, String>,
}

impl ApiErrorBody {
    /// Multi-line description for logs: status line, message, path, details.
    pub fn describe(&self) -> String {
        let status = self
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut parts = vec![format!(
            "[{}] {}",
            status,
            self.error.as_deref().unwrap_or("Error")
        )];
        parts.push(
            self.message
                .clone()
                .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string()),
        );
        if let Some(path) = &self.path {
            parts.push(format!("Path: {}", path));
        }
        if !self.details.is_empty() {
            let mut details: Vec<_> = self.details.iter().collect();
            details.sort();
            let joined = details
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; ");
            parts.push(format!("Details: {}", joined));
        }
        parts.join("\n")
    }
}

// --- TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_is_shown_verbatim() {
        let raw = r#"{"status":400,"error":"Bad request","message":"Not enough mana","path":"/api/matches/7/play"}"#;
        let err = ClientError::from_response(400, raw);
        assert_eq!(err.user_message(), "Not enough mana");
        assert!(!err.is_transport());
    }

    #[test]
    fn blank_or_unparseable_bodies_fall_back_to_generic_text() {
        let err = ClientError::from_response(500, "<html>gateway</html>");
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);

        let err = ClientError::from_response(400, r#"{"message":"   "}"#);
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);

        assert_eq!(ClientError::HeartbeatTimeout.user_message(), GENERIC_ERROR_MESSAGE);
        assert!(ClientError::HeartbeatTimeout.is_transport());
    }

    #[test]
    fn describe_lists_path_and_sorted_details() {
        let mut details = HashMap::new();
        details.insert("b".to_string(), "2".to_string());
        details.insert("a".to_string(), "1".to_string());
        let body = ApiErrorBody {
            status: Some(400),
            error: Some("Validation".into()),
            message: Some("instanceId: must not be blank".into()),
            path: Some("/api/matches/3/play".into()),
            details,
            ..Default::default()
        };
        let text = body.describe();
        assert!(text.starts_with("[400] Validation\n"));
        assert!(text.contains("Path: /api/matches/3/play"));
        assert!(text.ends_with("Details: a=1; b=2"));
    }
}
