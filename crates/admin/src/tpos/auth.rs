//! TPOS password-grant authentication.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::TposError;

/// OAuth client registered for the TPOS web app.
const CLIENT_ID: &str = "tmtWebApp";

/// Seconds before expiry at which a token is treated as expired.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// Bearer token obtained from `/token`.
#[derive(Debug, Clone)]
pub struct TposToken {
    pub access_token: SecretString,
    /// Unix timestamp when the token expires.
    pub expires_at: i64,
}

impl TposToken {
    /// Check if the token has expired (with a one minute buffer).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.expires_at - EXPIRY_BUFFER_SECS
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Log in with username and password.
///
/// # Errors
///
/// Returns `TposError::AuthenticationFailed` if TPOS rejects the credentials.
#[instrument(skip(client, password), fields(username = %username))]
pub async fn authenticate(
    client: &reqwest::Client,
    base_url: &str,
    username: &str,
    password: &SecretString,
) -> Result<TposToken, TposError> {
    let now = chrono::Utc::now().timestamp();

    let response = client
        .post(format!("{base_url}/token"))
        .form(&[
            ("grant_type", "password"),
            ("username", username),
            ("password", password.expose_secret()),
            ("client_id", CLIENT_ID),
        ])
        .send()
        .await?;

    let status = response.status();

    if status.is_success() {
        let token: TokenResponse = response.json().await?;
        return Ok(TposToken {
            access_token: SecretString::from(token.access_token),
            expires_at: now + token.expires_in,
        });
    }

    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = serde_json::from_str::<TokenErrorResponse>(&text)
        .ok()
        .and_then(|e| e.error_description.or(e.error))
        .unwrap_or_else(|| format!("HTTP {status}: {}", text.chars().take(200).collect::<String>()));

    Err(TposError::AuthenticationFailed(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_expired() {
        let now = chrono::Utc::now().timestamp();

        let expired = TposToken {
            access_token: SecretString::from("t"),
            expires_at: now - 10,
        };
        assert!(expired.is_expired());

        let almost = TposToken {
            access_token: SecretString::from("t"),
            expires_at: now + 30,
        };
        assert!(almost.is_expired());

        let valid = TposToken {
            access_token: SecretString::from("t"),
            expires_at: now + 3600,
        };
        assert!(!valid.is_expired());
    }
}
