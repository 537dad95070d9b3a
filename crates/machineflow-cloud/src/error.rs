//! Cloud API error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error entry returned by the provider alongside a failed call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderErrorDetail {
    /// Provider error code (e.g. "4019")
    pub code: Option<String>,

    /// Provider error type (e.g. "RequestLimitExceeded")
    pub error_type: Option<String>,

    /// Free-form details
    pub details: Option<String>,
}

impl std::fmt::Display for ProviderErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<&str> = [&self.error_type, &self.code, &self.details]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        write!(f, "{}", parts.join(" / "))
    }
}

/// Cloud API errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("API error (HTTP {status}){}", format_api_details(.errors, .request_id.as_deref()))]
    Api {
        status: u16,
        errors: Vec<ProviderErrorDetail>,
        request_id: Option<String>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("{resource} is in state '{observed}', expected '{expected}'")]
    StateMismatch {
        resource: String,
        expected: String,
        observed: String,
    },

    #[error(
        "Timeout: {resource} did not reach state '{expected}' after {attempts} attempts (last seen: '{observed}')"
    )]
    ConvergenceTimeout {
        resource: String,
        expected: String,
        observed: String,
        attempts: u32,
    },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_api_details(errors: &[ProviderErrorDetail], request_id: Option<&str>) -> String {
    let mut out = String::new();
    if !errors.is_empty() {
        let joined: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        out.push_str(": ");
        out.push_str(&joined.join("; "));
    }
    if let Some(id) = request_id {
        out.push_str(&format!(" [request {}]", id));
    }
    out
}

impl CloudError {
    /// HTTP status of the failed call, when the transport produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            CloudError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Structured provider errors attached to the failure
    pub fn provider_errors(&self) -> &[ProviderErrorDetail] {
        match self {
            CloudError::Api { errors, .. } => errors,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
