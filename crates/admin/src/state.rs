//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::facebook::FacebookClient;
use crate::services::ServiceError;
use crate::services::change_feed::ChangeFeed;
use crate::tpos::TposClient;

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    facebook: Option<FacebookClient>,
    tpos: Option<TposClient>,
    changes: ChangeFeed,
}

impl AppState {
    /// Build the state, creating API clients for the integrations that are
    /// configured.
    #[must_use]
    pub fn new(config: AppConfig, pool: PgPool) -> Self {
        let facebook = config.facebook().map(FacebookClient::new);
        let tpos = config.tpos().map(TposClient::new);

        if facebook.is_none() {
            tracing::warn!("Facebook not configured - comment import disabled");
        }
        if tpos.is_none() {
            tracing::warn!("TPOS not configured - order sync disabled");
        }

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                facebook,
                tpos,
                changes: ChangeFeed::default(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The Graph API client.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotConfigured` when Facebook credentials are absent.
    pub fn facebook(&self) -> Result<&FacebookClient, ServiceError> {
        self.inner
            .facebook
            .as_ref()
            .ok_or(ServiceError::NotConfigured("Facebook"))
    }

    /// The TPOS client.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotConfigured` when TPOS credentials are absent.
    pub fn tpos(&self) -> Result<&TposClient, ServiceError> {
        self.inner
            .tpos
            .as_ref()
            .ok_or(ServiceError::NotConfigured("TPOS"))
    }

    #[must_use]
    pub fn changes(&self) -> &ChangeFeed {
        &self.inner.changes
    }
}
