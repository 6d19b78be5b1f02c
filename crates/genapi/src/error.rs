//! Transport failures and their user-facing classification

use crate::types::GenerateResponse;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const RATE_LIMITED_MESSAGE: &str =
    "Too many requests. Please wait a moment and try again.";
pub const SERVER_MESSAGE: &str =
    "The generation service is having trouble right now. Please try again later.";
pub const CONNECTIVITY_MESSAGE: &str =
    "Could not reach the generation service. Check your connection and try again.";
pub const MALFORMED_MESSAGE: &str =
    "The generation service sent an unexpected response. Please try again.";

/// Coarse class of a generation failure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx or an unreadable body
    Server,
    /// The request never got a response
    Connectivity,
    /// The service answered and refused the request
    Rejected,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Rate limited by generation service")]
    RateLimited,

    #[error("Generation service error: HTTP {status}")]
    Server { status: u16 },

    #[error("Request failed: HTTP {status}")]
    Status { status: u16, message: Option<String> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ServiceError {
    /// Classify a non-success status, using the body's `message` when it has one
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            429 => ServiceError::RateLimited,
            500..=599 => ServiceError::Server { status },
            _ => ServiceError::Status {
                status,
                message: serde_json::from_str::<GenerateResponse>(body)
                    .ok()
                    .and_then(|r| r.message)
                    .filter(|m| !m.trim().is_empty()),
            },
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ServiceError::RateLimited => FailureKind::RateLimited,
            ServiceError::Server { .. } | ServiceError::Malformed(_) => FailureKind::Server,
            ServiceError::Status { .. } => FailureKind::Rejected,
            ServiceError::Network(_) => FailureKind::Connectivity,
        }
    }

    /// Message suitable for showing to the person using the app
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::RateLimited => RATE_LIMITED_MESSAGE.to_string(),
            ServiceError::Server { .. } => SERVER_MESSAGE.to_string(),
            ServiceError::Status {
                message: Some(message),
                ..
            } => message.clone(),
            ServiceError::Status {
                status,
                message: None,
            } => format!("The generation service rejected the request (HTTP {}).", status),
            ServiceError::Network(_) => CONNECTIVITY_MESSAGE.to_string(),
            ServiceError::Malformed(_) => MALFORMED_MESSAGE.to_string(),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Malformed(err.to_string())
        } else {
            ServiceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Malformed(err.to_string())
    }
}

impl From<&ServiceError> for GenerateResponse {
    fn from(err: &ServiceError) -> Self {
        GenerateResponse::failure(err.user_message())
    }
}
