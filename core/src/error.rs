use serde_json::Value;

pub const TIMEOUT_MESSAGE: &str = "Request timed out. Please try again.";
pub const NETWORK_MESSAGE: &str = "An unexpected network error occurred.";

/// Failure of any operation that crosses the network boundary.
///
/// The `Display` text is what gets shown to the user; it is never empty.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Request timed out. Please try again.")]
    Timeout,
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("An unexpected network error occurred.")]
    Network { detail: String },
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            return Self::Http {
                status,
                message: generic_status_message(status),
            };
        }
        Self::Http { status, message }
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self::Network {
            detail: detail.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Whether repeating the same action unchanged could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Validation(_) => false,
        }
    }

    /// Replaces an empty message with the caller's fallback.
    pub(crate) fn or_message(self, fallback: &str) -> Self {
        match self {
            Self::Http { status, message } if message.trim().is_empty() => Self::Http {
                status,
                message: fallback.to_string(),
            },
            Self::Validation(message) if message.trim().is_empty() => {
                Self::Validation(fallback.to_string())
            }
            other => other,
        }
    }
}

pub fn generic_status_message(status: u16) -> String {
    format!("HTTP error! Status: {status}")
}

/// Picks the message for a non-success response body.
///
/// A JSON object yields its `detail` field, then `message`, then the whole
/// object re-serialized. Anything else falls back to the raw text, and an
/// empty body to the generic status line.
pub fn extract_http_message(status: u16, body: &[u8]) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        for key in ["detail", "message"] {
            match map.get(key) {
                Some(Value::String(text)) if !text.is_empty() => return text.clone(),
                Some(Value::Null) | Some(Value::String(_)) | None => {}
                Some(other) => return other.to_string(),
            }
        }
        return Value::Object(map).to_string();
    }
    let text = String::from_utf8_lossy(body);
    if text.trim().is_empty() {
        generic_status_message(status)
    } else {
        text.into_owned()
    }
}
