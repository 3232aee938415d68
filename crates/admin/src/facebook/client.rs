//! Graph API client with short-lived response caches.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::FacebookError;
use super::types::{FacebookComment, FacebookVideo, GraphErrorBody, GraphPage};
use crate::config::FacebookConfig;

const VIDEO_FIELDS: &str = "id,title,description,live_status,permalink_url,created_time";
const COMMENT_FIELDS: &str = "id,message,from{id,name},created_time";
const COMMENT_PAGE_SIZE: &str = "100";
/// Upper bound on followed comment pages (100 comments each).
const MAX_COMMENT_PAGES: usize = 500;

/// Client for the Facebook Graph API.
///
/// Video lists are cached for 60 seconds and comment lists for 10 seconds.
/// Passing `refresh = true` skips the cache and stores the fresh result.
#[derive(Clone)]
pub struct FacebookClient {
    inner: Arc<FacebookClientInner>,
}

struct FacebookClientInner {
    client: reqwest::Client,
    graph_url: String,
    api_version: String,
    page_id: String,
    access_token: SecretString,
    videos: Cache<String, Arc<Vec<FacebookVideo>>>,
    comments: Cache<String, Arc<Vec<FacebookComment>>>,
}

impl std::fmt::Debug for FacebookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacebookClient")
            .field("graph_url", &self.inner.graph_url)
            .field("api_version", &self.inner.api_version)
            .field("page_id", &self.inner.page_id)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl FacebookClient {
    /// Create a new Graph API client.
    #[must_use]
    pub fn new(config: &FacebookConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            inner: Arc::new(FacebookClientInner {
                client,
                graph_url: config.graph_url.trim_end_matches('/').to_string(),
                api_version: config.api_version.clone(),
                page_id: config.page_id.clone(),
                access_token: config.page_access_token.clone(),
                videos: Cache::builder()
                    .max_capacity(16)
                    .time_to_live(Duration::from_secs(60))
                    .build(),
                comments: Cache::builder()
                    .max_capacity(256)
                    .time_to_live(Duration::from_secs(10))
                    .build(),
            }),
        }
    }

    /// Page whose videos are listed.
    #[must_use]
    pub fn page_id(&self) -> &str {
        &self.inner.page_id
    }

    /// List the page's videos, newest first.
    ///
    /// # Errors
    ///
    /// Returns `FacebookError::Api` if the Graph API rejects the request.
    #[instrument(skip(self))]
    pub async fn list_videos(
        &self,
        refresh: bool,
    ) -> Result<Arc<Vec<FacebookVideo>>, FacebookError> {
        let key = self.inner.page_id.clone();
        if !refresh && let Some(videos) = self.inner.videos.get(&key).await {
            return Ok(videos);
        }

        let url = self.endpoint(
            &format!("{}/videos", self.inner.page_id),
            &[("fields", VIDEO_FIELDS), ("limit", "25")],
        )?;
        let page: GraphPage<FacebookVideo> = self.get_json(url).await?;

        let videos = Arc::new(page.data);
        self.inner.videos.insert(key, Arc::clone(&videos)).await;
        Ok(videos)
    }

    /// Every comment of a video in chronological order.
    ///
    /// # Errors
    ///
    /// Returns `FacebookError::Api` if any page is rejected.
    #[instrument(skip(self))]
    pub async fn list_comments(
        &self,
        video_id: &str,
        refresh: bool,
    ) -> Result<Arc<Vec<FacebookComment>>, FacebookError> {
        if !refresh && let Some(comments) = self.inner.comments.get(video_id).await {
            return Ok(comments);
        }

        let mut comments = Vec::new();
        let mut after: Option<String> = None;

        for _ in 0..MAX_COMMENT_PAGES {
            let mut params = vec![
                ("fields", COMMENT_FIELDS),
                ("order", "chronological"),
                ("filter", "stream"),
                ("limit", COMMENT_PAGE_SIZE),
            ];
            if let Some(cursor) = after.as_deref() {
                params.push(("after", cursor));
            }

            let url = self.endpoint(&format!("{video_id}/comments"), &params)?;
            let page: GraphPage<FacebookComment> = self.get_json(url).await?;

            let next = page.next_cursor().map(String::from);
            let fetched = page.data.len();
            comments.extend(page.data);

            match next {
                Some(cursor) if fetched > 0 => after = Some(cursor),
                _ => break,
            }
        }

        debug!(video_id, count = comments.len(), "Fetched comments");

        let comments = Arc::new(comments);
        self.inner
            .comments
            .insert(video_id.to_string(), Arc::clone(&comments))
            .await;
        Ok(comments)
    }

    /// Drop the cached comments of a video so the next read hits the API.
    pub async fn invalidate_comments(&self, video_id: &str) {
        self.inner.comments.invalidate(video_id).await;
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, FacebookError> {
        let mut url = Url::parse(&format!(
            "{}/{}/{}",
            self.inner.graph_url, self.inner.api_version, path
        ))?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("access_token", self.inner.access_token.expose_secret());
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FacebookError> {
        let response = self.inner.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = serde_json::from_str::<GraphErrorBody>(&body).map_or_else(
                |_| FacebookError::Api {
                    code: i64::from(status.as_u16()),
                    message: body.chars().take(200).collect(),
                },
                |parsed| FacebookError::Api {
                    code: parsed.error.code,
                    message: parsed.error.message,
                },
            );
            tracing::warn!(status = %status, error = %err, "Graph API request failed");
            return Err(err);
        }

        Ok(serde_json::from_str(&body)?)
    }
}
