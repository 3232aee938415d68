//! TPOS retail platform client.
//!
//! TPOS exposes an OData REST API behind an OAuth password grant. The
//! back-office uses it to look up products by code, push live orders as
//! `SaleOnline_Order` records, and read them back for reconciliation.
//!
//! # Architecture
//!
//! - Username/password -> bearer token via `/token` (`client_id=tmtWebApp`)
//! - Token cached in memory until shortly before it expires
//! - A 401 from the API drops the cached token; the caller sees the error
//!   and the next call logs in again

pub mod auth;
pub mod client;
pub mod types;

pub use client::TposClient;
pub use types::{SaleOnlineOrder, SaleOnlineOrderDetail, SaleOnlineOrderInput, TposProduct};

use thiserror::Error;

/// Errors that can occur when interacting with TPOS.
#[derive(Debug, Error)]
pub enum TposError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Login was refused.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Token expired or was revoked mid-request.
    #[error("Access token rejected")]
    Unauthorized,

    /// API answered with a non-success status.
    #[error("TPOS returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response excerpt.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A paged listing still had a next link after the page limit.
    #[error("TPOS listing exceeded {0} pages")]
    TooManyPages(usize),

    /// Endpoint URL could not be built.
    #[error("invalid TPOS URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Quote a value for an OData `$filter` string literal.
#[must_use]
pub fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tpos_error_display() {
        let err = TposError::Api {
            status: 400,
            message: "Invalid product".to_string(),
        };
        assert_eq!(err.to_string(), "TPOS returned 400: Invalid product");
    }

    #[test]
    fn test_odata_literal_escapes_quotes() {
        assert_eq!(odata_literal("AO-01"), "'AO-01'");
        assert_eq!(odata_literal("O'Neil"), "'O''Neil'");
    }
}
