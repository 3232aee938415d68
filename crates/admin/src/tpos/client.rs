//! TPOS OData client.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use url::Url;

use super::auth::{TposToken, authenticate};
use super::types::{ODataList, SaleOnlineOrder, SaleOnlineOrderInput, TposProduct};
use super::{TposError, odata_literal};
use crate::config::TposConfig;

/// Upper bound on followed `@odata.nextLink` pages.
const MAX_PAGES: usize = 50;

/// TPOS API client.
///
/// # Authentication
///
/// Logs in with the configured account on first use. The token is cached in
/// memory and replaced when it expires or TPOS rejects it.
#[derive(Clone)]
pub struct TposClient {
    inner: Arc<TposClientInner>,
}

struct TposClientInner {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: SecretString,
    /// In-memory token cache
    token: RwLock<Option<TposToken>>,
}

impl std::fmt::Debug for TposClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TposClient")
            .field("base_url", &self.inner.base_url)
            .field("username", &self.inner.username)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl TposClient {
    /// Create a new TPOS client. No request is made until first use.
    #[must_use]
    pub fn new(config: &TposConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            inner: Arc::new(TposClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                username: config.username.clone(),
                password: config.password.clone(),
                token: RwLock::new(None),
            }),
        }
    }

    /// Look up a product by its default code.
    ///
    /// # Errors
    ///
    /// Returns `TposError` if the request fails.
    #[instrument(skip(self))]
    pub async fn find_product_by_code(
        &self,
        code: &str,
    ) -> Result<Option<TposProduct>, TposError> {
        let mut url = self.odata_url("Product")?;
        url.query_pairs_mut()
            .append_pair("$filter", &format!("DefaultCode eq {}", odata_literal(code.trim())))
            .append_pair("$top", "1");

        let list: ODataList<TposProduct> = self.get_json(url).await?;
        Ok(list.value.into_iter().next())
    }

    /// Create a `SaleOnline_Order`.
    ///
    /// # Errors
    ///
    /// Returns `TposError::Api` if TPOS rejects the order.
    #[instrument(skip(self, order), fields(comment_id = ?order.facebook_comment_id))]
    pub async fn create_sale_online_order(
        &self,
        order: &SaleOnlineOrderInput,
    ) -> Result<SaleOnlineOrder, TposError> {
        let url = self.odata_url("SaleOnline_Order")?;
        let token = self.access_token().await?;

        let response = self
            .inner
            .client
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(order)
            .send()
            .await?;

        let created: SaleOnlineOrder = self.read_json(response).await?;
        debug!(tpos_order_id = %created.id, code = ?created.code, "Created TPOS order");
        Ok(created)
    }

    /// Every `SaleOnline_Order` created for a Facebook post or video.
    ///
    /// # Errors
    ///
    /// Returns `TposError` if any page fails and `TposError::TooManyPages`
    /// when the listing does not end within the page limit.
    #[instrument(skip(self))]
    pub async fn list_sale_online_orders_for_post(
        &self,
        post_id: &str,
    ) -> Result<Vec<SaleOnlineOrder>, TposError> {
        let mut url = self.odata_url("SaleOnline_Order")?;
        url.query_pairs_mut()
            .append_pair("$filter", &format!("Facebook_PostId eq {}", odata_literal(post_id)));

        let mut orders = Vec::new();
        let mut next = Some(url);

        for _ in 0..MAX_PAGES {
            let Some(page_url) = next.take() else { break };
            let page: ODataList<SaleOnlineOrder> = self.get_json(page_url).await?;
            orders.extend(page.value);
            next = page.next_link.as_deref().map(Url::parse).transpose()?;
        }

        if next.is_some() {
            warn!(post_id, fetched = orders.len(), "TPOS order listing truncated");
            return Err(TposError::TooManyPages(MAX_PAGES));
        }

        Ok(orders)
    }

    fn odata_url(&self, entity: &str) -> Result<Url, TposError> {
        Ok(Url::parse(&format!("{}/odata/{entity}", self.inner.base_url))?)
    }

    /// Return a valid token, logging in when none is cached or it expired.
    async fn access_token(&self) -> Result<SecretString, TposError> {
        if let Some(token) = self.inner.token.read().await.as_ref()
            && !token.is_expired()
        {
            return Ok(token.access_token.clone());
        }

        let mut slot = self.inner.token.write().await;
        // Another task may have logged in while we waited for the lock.
        if let Some(token) = slot.as_ref()
            && !token.is_expired()
        {
            return Ok(token.access_token.clone());
        }

        let token = authenticate(
            &self.inner.client,
            &self.inner.base_url,
            &self.inner.username,
            &self.inner.password,
        )
        .await?;
        let access = token.access_token.clone();
        *slot = Some(token);
        Ok(access)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, TposError> {
        let token = self.access_token().await?;
        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        self.read_json(response).await
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, TposError> {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            *self.inner.token.write().await = None;
            return Err(TposError::Unauthorized);
        }

        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "TPOS returned non-success status"
            );
            return Err(TposError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let client = TposClient::new(&TposConfig {
            base_url: "https://tpos.example.test/".to_string(),
            username: "shop".to_string(),
            password: SecretString::from("hunter2"),
        });

        let debug = format!("{client:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(client.inner.base_url, "https://tpos.example.test");
    }
}
