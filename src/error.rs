//! Error types for upstream providers and the HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure of a single upstream provider call
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} request failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{provider} parse failed: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} API error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} quota reached: {message}")]
    Quota {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} local rate limit exhausted")]
    RateLimited { provider: &'static str },

    #[error("{0}")]
    NoData(String),

    #[error("invalid number in '{field}': {value:?}")]
    InvalidNumber { field: String, value: String },

    #[error("{0}")]
    InvalidParam(String),
}

impl ProviderError {
    pub fn decode(provider: &'static str, err: impl std::fmt::Display) -> Self {
        ProviderError::Decode {
            provider,
            message: err.to_string(),
        }
    }
}

/// Error returned from route handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    TooManyRequests(String),
}

impl ApiError {
    /// Classify a provider failure. `message` is the generic text shown to
    /// callers when the upstream itself is at fault.
    pub fn from_provider(err: ProviderError, message: &str) -> Self {
        match err {
            ProviderError::Http { .. }
            | ProviderError::Status { .. }
            | ProviderError::Decode { .. }
            | ProviderError::Api { .. }
            | ProviderError::Quota { .. } => ApiError::ServiceUnavailable(message.to_string()),
            ProviderError::RateLimited { provider } => {
                ApiError::TooManyRequests(format!("Rate limit for {} exceeded", provider))
            }
            ProviderError::NoData(_) | ProviderError::InvalidNumber { .. } => {
                ApiError::Internal(message.to_string())
            }
            ProviderError::InvalidParam(msg) => ApiError::BadRequest(msg),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::ServiceUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::TooManyRequests(_) => "RATE_LIMITED",
        }
    }
}

/// Serializable error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            status_code: status.as_u16(),
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
