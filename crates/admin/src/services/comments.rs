//! Turning live-video comments into orders.

use std::collections::BTreeSet;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument};

use liveshop_core::matching::{
    CommentInput, CommentMatch, MatchContext, MatchSummary, ProductInput, match_comments, summarize,
};
use liveshop_core::{CustomerStatus, LivePhaseId, StaffUserId};

use super::ServiceError;
use super::change_feed::{ChangeAction, ChangeEvent, ChangeFeed};
use crate::db::live_orders::QuickAddError;
use crate::db::{CustomerRepository, LiveOrderRepository, LiveProductRepository, LiveSessionRepository};
use crate::facebook::{FacebookClient, FacebookComment};
use crate::models::{CommentRef, NewLiveOrder};

/// Fallback name for commenters the Graph API does not identify.
const UNNAMED_COMMENTER: &str = "Facebook user";

/// Matched comments of a phase's video.
#[derive(Debug, Clone, Serialize)]
pub struct CommentPreview {
    pub phase_id: LivePhaseId,
    pub video_id: String,
    pub summary: MatchSummary,
    pub comments: Vec<CommentMatch>,
}

/// What an import did with each claim it saw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    /// Orders created.
    pub created: usize,
    /// Of those, orders flagged oversell on creation.
    pub oversell: usize,
    /// Claims whose comment already produced the order.
    pub skipped_ordered: usize,
    /// Claims from blacklisted commenters.
    pub skipped_blacklisted: usize,
    /// Codes that match no product of the phase.
    pub skipped_unknown: usize,
    /// Claims that lost a race with a concurrent import.
    pub duplicates: usize,
}

/// Comment preview and import for live phases.
pub struct CommentService<'a> {
    pool: &'a PgPool,
    facebook: &'a FacebookClient,
    changes: &'a ChangeFeed,
}

impl<'a> CommentService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, facebook: &'a FacebookClient, changes: &'a ChangeFeed) -> Self {
        Self {
            pool,
            facebook,
            changes,
        }
    }

    /// Match the comments of the phase's video against its products.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown phase and
    /// `ServiceError::Invalid` when no video is attached.
    #[instrument(skip(self))]
    pub async fn preview(
        &self,
        phase_id: LivePhaseId,
        refresh: bool,
    ) -> Result<CommentPreview, ServiceError> {
        let (video_id, comments) = self.match_phase(phase_id, refresh).await?;

        Ok(CommentPreview {
            phase_id,
            video_id,
            summary: summarize(&comments),
            comments,
        })
    }

    /// Create orders for every pending claim of the phase's comments.
    ///
    /// Always reads fresh comments. Blacklisted commenters are skipped; other
    /// commenters are upserted as customers by Facebook ID first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` on database or Graph API failures. Orders
    /// created before a failure stay created.
    #[instrument(skip(self))]
    pub async fn import(
        &self,
        phase_id: LivePhaseId,
        staff_id: StaffUserId,
    ) -> Result<ImportOutcome, ServiceError> {
        let (_, matches) = self.match_phase(phase_id, true).await?;

        let customers = CustomerRepository::new(self.pool);
        let orders = LiveOrderRepository::new(self.pool);
        let mut outcome = ImportOutcome::default();

        for comment in &matches {
            outcome.skipped_unknown += comment.unknown_codes.len();
            outcome.skipped_ordered += comment.matched.iter().filter(|c| c.already_ordered).count();

            let pending: Vec<_> = comment.pending_claims().collect();
            if pending.is_empty() {
                continue;
            }
            if comment.customer_status == Some(CustomerStatus::Blacklisted) {
                outcome.skipped_blacklisted += pending.len();
                continue;
            }

            let customer_id = match comment.from_id.as_deref() {
                Some(facebook_id) => Some(
                    customers
                        .upsert_by_facebook_id(
                            facebook_id,
                            comment.from_name.as_deref().unwrap_or(UNNAMED_COMMENTER),
                            comment.phone.as_ref(),
                        )
                        .await?
                        .id,
                ),
                None => None,
            };

            for claim in pending {
                let new_order = NewLiveOrder {
                    phase_id,
                    order_code: claim.session_index.clone(),
                    quantity: claim.quantity,
                    customer_id,
                    comment: Some(CommentRef {
                        comment_id: comment.comment_id.clone(),
                        user_id: comment.from_id.clone(),
                        user_name: comment.from_name.clone(),
                        message: Some(comment.message.clone()),
                    }),
                    created_by: Some(staff_id),
                };

                match orders.quick_add(&new_order).await {
                    Ok((order, product)) => {
                        outcome.created += 1;
                        if order.is_oversell {
                            outcome.oversell += 1;
                        }
                        self.changes.publish(
                            ChangeEvent::new("live_order", ChangeAction::Insert, order.id.as_i32())
                                .in_phase(phase_id),
                        );
                        self.changes.publish(
                            ChangeEvent::new("live_product", ChangeAction::Update, product.id.as_i32())
                                .in_phase(phase_id),
                        );
                    }
                    Err(QuickAddError::DuplicateComment) => outcome.duplicates += 1,
                    Err(QuickAddError::UnknownCode(_)) => outcome.skipped_unknown += 1,
                    Err(err) => return Err(err.into()),
                }
            }
        }

        info!(
            phase_id = %phase_id,
            created = outcome.created,
            oversell = outcome.oversell,
            skipped_ordered = outcome.skipped_ordered,
            skipped_blacklisted = outcome.skipped_blacklisted,
            "Imported comments"
        );

        Ok(outcome)
    }

    async fn match_phase(
        &self,
        phase_id: LivePhaseId,
        refresh: bool,
    ) -> Result<(String, Vec<CommentMatch>), ServiceError> {
        let phase = LiveSessionRepository::new(self.pool)
            .get_phase(phase_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("phase {phase_id}")))?;
        let video_id = phase.facebook_video_id.ok_or_else(|| {
            ServiceError::Invalid("phase has no Facebook video attached".to_string())
        })?;

        let comments = self.facebook.list_comments(&video_id, refresh).await?;
        let products = LiveProductRepository::new(self.pool)
            .list_by_phase(phase_id)
            .await?;
        let linked = LiveOrderRepository::new(self.pool)
            .linked_comments(phase_id)
            .await?;

        let commenters: Vec<String> = comments
            .iter()
            .filter_map(|c| c.from.as_ref().map(|f| f.id.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let statuses = CustomerRepository::new(self.pool)
            .statuses_by_facebook_id(&commenters)
            .await?;

        let product_inputs: Vec<ProductInput<'_>> = products
            .iter()
            .map(|p| ProductInput {
                id: p.id,
                session_index: &p.session_index,
            })
            .collect();
        let context = MatchContext::new(&product_inputs)
            .with_linked(linked.iter().map(|(comment, product)| (comment.as_str(), *product)))
            .with_statuses(statuses.iter().map(|(id, status)| (id.as_str(), *status)));

        let inputs: Vec<CommentInput<'_>> = comments.iter().map(FacebookComment::as_input).collect();
        Ok((video_id, match_comments(&inputs, &context)))
    }
}
