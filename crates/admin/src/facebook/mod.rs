//! Facebook Graph API client for live videos and their comments.
//!
//! # Architecture
//!
//! - Page access token from configuration, sent as `access_token` query param
//! - Responses cached in memory via `moka` (videos 60 s, comments 10 s)
//! - Comment pages followed through `paging.cursors.after`
//! - Webhook deliveries verified with `X-Hub-Signature-256`
//!
//! Comments are never persisted. The database only keeps the comment ID on
//! the orders created from them.

pub mod client;
pub mod types;
pub mod webhook;

pub use client::FacebookClient;
pub use types::{CommentAuthor, FacebookComment, FacebookVideo};

use thiserror::Error;

/// Errors that can occur when talking to the Graph API.
#[derive(Debug, Error)]
pub enum FacebookError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Graph API returned an error object.
    #[error("Graph API error {code}: {message}")]
    Api {
        /// Graph error code (190 = expired token).
        code: i64,
        /// Graph error message.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("invalid Graph URL: {0}")]
    Url(#[from] url::ParseError),

    /// Webhook signature missing or wrong.
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facebook_error_display() {
        let err = FacebookError::Api {
            code: 190,
            message: "Error validating access token".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Graph API error 190: Error validating access token"
        );
    }
}
