// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client error types and parsing of the backend's error details.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Errors surfaced by the session client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(ErrorDetail),

    #[error("Password change required: {message}")]
    PasswordChangeRequired { message: String },

    /// The token refresh did not produce a usable access token. See
    /// [`RefreshFailure::kind`] for whether the session survived.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshFailure),

    /// The profile could not be loaded for a fresh token. The session has been cleared.
    #[error("Profile fetch failed: {0}")]
    ProfileFetch(String),

    #[error("Logout notification failed: {0}")]
    LogoutNotification(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: ErrorDetail },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Session storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::InvalidCredentials(_) => Some(401),
            _ => None,
        }
    }

    /// True when the error ended the session and the caller must treat the
    /// user as logged out rather than retry.
    ///
    /// A refresh that was superseded by a logout or a new login, or whose
    /// initiator was cancelled, leaves the current session alone and is not
    /// counted here.
    pub fn is_session_ended(&self) -> bool {
        match self {
            ClientError::RefreshFailed(failure) => failure.kind() == RefreshFailureKind::Rejected,
            ClientError::ProfileFetch(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

/// Why a refresh cycle produced no token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshFailureKind {
    /// The refresh was rejected, failed or timed out. The session was cleared.
    Rejected,
    /// The session was replaced or logged out while the refresh was in flight.
    Superseded,
    /// The task running the refresh was dropped before it finished.
    Abandoned,
}

/// Outcome of a failed refresh cycle, handed to every request waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct RefreshFailure {
    kind: RefreshFailureKind,
    reason: Arc<str>,
}

impl RefreshFailure {
    /// A terminal failure: the session is gone.
    pub fn new(reason: impl Into<String>) -> Self {
        Self::with_kind(RefreshFailureKind::Rejected, reason)
    }

    pub fn superseded(reason: impl Into<String>) -> Self {
        Self::with_kind(RefreshFailureKind::Superseded, reason)
    }

    pub fn abandoned(reason: impl Into<String>) -> Self {
        Self::with_kind(RefreshFailureKind::Abandoned, reason)
    }

    fn with_kind(kind: RefreshFailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: Arc::from(reason.into()),
        }
    }

    pub fn kind(&self) -> RefreshFailureKind {
        self.kind
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// One entry of a request validation error (`{"loc": [...], "msg": ..., "type": ...}`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValidationIssue {
    #[serde(default)]
    pub loc: Vec<Value>,
    pub msg: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.loc.is_empty() {
            return f.write_str(&self.msg);
        }
        let loc = self
            .loc
            .iter()
            .map(|part| match part {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{}: {}", loc, self.msg)
    }
}

/// The `detail` field of a backend error body.
///
/// The backend sends a plain message, a list of validation issues, or an
/// arbitrary object depending on the failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    Empty,
    Message(String),
    Validation(Vec<ValidationIssue>),
    Object(Value),
}

impl ErrorDetail {
    /// Parse a raw response body. Non-JSON bodies become a plain message.
    pub fn from_body(body: &[u8]) -> Self {
        let Ok(value) = serde_json::from_slice::<Value>(body) else {
            let text = String::from_utf8_lossy(body).trim().to_string();
            return if text.is_empty() {
                ErrorDetail::Empty
            } else {
                ErrorDetail::Message(text)
            };
        };

        match value {
            Value::Object(mut map) => match map.remove("detail") {
                Some(detail) => Self::from_value(detail),
                None => ErrorDetail::Object(Value::Object(map)),
            },
            other => Self::from_value(other),
        }
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => ErrorDetail::Empty,
            Value::String(s) => ErrorDetail::Message(s),
            Value::Array(items) => {
                match serde_json::from_value::<Vec<ValidationIssue>>(Value::Array(items.clone())) {
                    Ok(issues) => ErrorDetail::Validation(issues),
                    Err(_) => ErrorDetail::Object(Value::Array(items)),
                }
            }
            other => ErrorDetail::Object(other),
        }
    }

    /// Message of a "password change required" signal, if this detail carries one.
    pub fn password_change_message(&self) -> Option<String> {
        let ErrorDetail::Object(Value::Object(map)) = self else {
            return None;
        };
        if map.get("requires_password_change") != Some(&Value::Bool(true)) {
            return None;
        }
        Some(
            map.get("message")
                .and_then(Value::as_str)
                .unwrap_or("Password change required")
                .to_string(),
        )
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDetail::Empty => f.write_str("no details"),
            ErrorDetail::Message(msg) => f.write_str(msg),
            ErrorDetail::Validation(issues) => {
                let joined = issues
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                f.write_str(&joined)
            }
            ErrorDetail::Object(value) => match value.get("message").and_then(Value::as_str) {
                Some(msg) => f.write_str(msg),
                None => write!(f, "{}", value),
            },
        }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
