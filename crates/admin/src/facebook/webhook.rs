//! Page webhook: subscription handshake, signature check, and payload types.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use super::FacebookError;

/// Header carrying `sha256=<hex HMAC of the raw body>`.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Verify a delivery against the app secret.
///
/// # Errors
///
/// Returns `FacebookError::InvalidSignature` when the header is malformed or
/// the digest does not match.
pub fn verify_signature(app_secret: &str, body: &[u8], header: &str) -> Result<(), FacebookError> {
    let provided = header
        .strip_prefix("sha256=")
        .ok_or_else(|| FacebookError::InvalidSignature("missing sha256= prefix".to_string()))?;

    let mut mac = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes())
        .map_err(|e| FacebookError::InvalidSignature(e.to_string()))?;
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if !constant_time_compare(&expected, &provided.to_ascii_lowercase()) {
        return Err(FacebookError::InvalidSignature(
            "signature mismatch".to_string(),
        ));
    }
    Ok(())
}

/// Answer the `GET` subscription handshake.
///
/// Returns the challenge to echo when the mode is `subscribe` and the token
/// matches.
#[must_use]
pub fn handshake_challenge<'a>(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&'a str>,
    expected_token: &str,
) -> Option<&'a str> {
    if mode != Some("subscribe") {
        return None;
    }
    let token = token?;
    if !constant_time_compare(token, expected_token) {
        return None;
    }
    challenge
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// Body of a page webhook delivery.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    pub field: String,
    #[serde(default)]
    pub value: FeedValue,
}

/// The `value` of a `feed` change. Only the fields used here are kept.
#[derive(Debug, Default, Deserialize)]
pub struct FeedValue {
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub verb: Option<String>,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub comment_id: Option<String>,
}

impl FeedValue {
    /// Video the change belongs to. Post IDs look like `{page_id}_{object_id}`.
    #[must_use]
    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref().or_else(|| {
            self.post_id
                .as_deref()
                .map(|post| post.rsplit_once('_').map_or(post, |(_, id)| id))
        })
    }
}

impl WebhookPayload {
    /// Distinct videos that received comment changes, in delivery order.
    #[must_use]
    pub fn commented_videos(&self) -> Vec<&str> {
        let mut videos: Vec<&str> = Vec::new();
        for change in self.entry.iter().flat_map(|e| &e.changes) {
            if change.field != "feed" || change.value.item.as_deref() != Some("comment") {
                continue;
            }
            if let Some(video) = change.value.video_id()
                && !videos.contains(&video)
            {
                videos.push(video);
            }
        }
        videos
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_signature_verification_valid() {
        let body = br#"{"object":"page","entry":[]}"#;
        let header = sign("app-secret", body);
        assert!(verify_signature("app-secret", body, &header).is_ok());
    }

    #[test]
    fn test_signature_verification_wrong_secret() {
        let body = br#"{"object":"page","entry":[]}"#;
        let header = sign("other-secret", body);
        assert!(matches!(
            verify_signature("app-secret", body, &header),
            Err(FacebookError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_signature_verification_missing_prefix() {
        assert!(verify_signature("app-secret", b"{}", "deadbeef").is_err());
    }

    #[test]
    fn test_handshake() {
        assert_eq!(
            handshake_challenge(Some("subscribe"), Some("tok"), Some("42"), "tok"),
            Some("42")
        );
        assert_eq!(
            handshake_challenge(Some("subscribe"), Some("bad"), Some("42"), "tok"),
            None
        );
        assert_eq!(
            handshake_challenge(Some("unsubscribe"), Some("tok"), Some("42"), "tok"),
            None
        );
    }

    #[test]
    fn test_commented_videos_dedups_and_skips_other_items() {
        let payload: WebhookPayload = serde_json::from_str(
            r#"{
                "object": "page",
                "entry": [{
                    "id": "1001",
                    "changes": [
                        {"field": "feed", "value": {"item": "comment", "verb": "add", "post_id": "1001_555", "comment_id": "555_1"}},
                        {"field": "feed", "value": {"item": "comment", "verb": "add", "post_id": "1001_555", "comment_id": "555_2"}},
                        {"field": "feed", "value": {"item": "reaction", "verb": "add", "post_id": "1001_777"}},
                        {"field": "feed", "value": {"item": "comment", "verb": "add", "video_id": "888"}}
                    ]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(payload.commented_videos(), vec!["555", "888"]);
    }
}
