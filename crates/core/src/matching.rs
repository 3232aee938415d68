//! Comment-to-product matching.
//!
//! Takes the comments of a live video and the products of the phase being
//! streamed, and decides which comments claim which products. Nothing here
//! writes anything: the service turns matches into orders.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session_index::{SessionIndex, extract_claims};
use crate::{CustomerStatus, LiveProductId, Phone};

/// A comment as seen by the matcher.
#[derive(Debug, Clone)]
pub struct CommentInput<'a> {
    /// Facebook comment ID.
    pub id: &'a str,
    /// Comment text.
    pub message: &'a str,
    /// Commenter's Facebook ID.
    pub from_id: Option<&'a str>,
    /// Commenter's display name.
    pub from_name: Option<&'a str>,
    /// When the comment was posted.
    pub created_time: DateTime<Utc>,
}

/// A phase product as seen by the matcher.
#[derive(Debug, Clone)]
pub struct ProductInput<'a> {
    /// Product ID.
    pub id: LiveProductId,
    /// The product's session code.
    pub session_index: &'a SessionIndex,
}

/// Everything the matcher needs besides the comments.
#[derive(Debug, Default)]
pub struct MatchContext<'a> {
    /// Products of the phase, keyed by code after construction.
    products: HashMap<&'a SessionIndex, LiveProductId>,
    /// `(comment_id, product_id)` pairs that already produced an order.
    linked: HashSet<(&'a str, LiveProductId)>,
    /// Known customer statuses keyed by Facebook ID.
    statuses: HashMap<&'a str, CustomerStatus>,
}

impl<'a> MatchContext<'a> {
    /// Build a context from the phase products.
    #[must_use]
    pub fn new(products: &[ProductInput<'a>]) -> Self {
        Self {
            products: products.iter().map(|p| (p.session_index, p.id)).collect(),
            ..Self::default()
        }
    }

    /// Register comment/product pairs that already have an order.
    #[must_use]
    pub fn with_linked(mut self, linked: impl IntoIterator<Item = (&'a str, LiveProductId)>) -> Self {
        self.linked.extend(linked);
        self
    }

    /// Register customer statuses by Facebook ID.
    #[must_use]
    pub fn with_statuses(
        mut self,
        statuses: impl IntoIterator<Item = (&'a str, CustomerStatus)>,
    ) -> Self {
        self.statuses.extend(statuses);
        self
    }
}

/// A claim that resolved to a phase product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedClaim {
    /// The claimed code.
    pub session_index: SessionIndex,
    /// The product the code belongs to.
    pub product_id: LiveProductId,
    /// Units claimed.
    pub quantity: i32,
    /// Whether this comment already produced an order for this product.
    pub already_ordered: bool,
}

/// Matcher verdict for one comment.
#[derive(Debug, Clone, Serialize)]
pub struct CommentMatch {
    /// Facebook comment ID.
    pub comment_id: String,
    /// Commenter's Facebook ID.
    pub from_id: Option<String>,
    /// Commenter's display name.
    pub from_name: Option<String>,
    /// Comment text.
    pub message: String,
    /// When the comment was posted.
    pub created_time: DateTime<Utc>,
    /// Claims that resolved to products.
    pub matched: Vec<MatchedClaim>,
    /// Codes that did not resolve to any product of the phase.
    pub unknown_codes: Vec<SessionIndex>,
    /// Phone number written in the comment, if any.
    pub phone: Option<Phone>,
    /// Known status of the commenter.
    pub customer_status: Option<CustomerStatus>,
}

impl CommentMatch {
    /// Whether the comment claims at least one product.
    #[must_use]
    pub fn has_claims(&self) -> bool {
        !self.matched.is_empty()
    }

    /// Whether every matched claim already has an order.
    #[must_use]
    pub fn fully_ordered(&self) -> bool {
        self.has_claims() && self.matched.iter().all(|c| c.already_ordered)
    }

    /// Whether staff should look at this commenter before shipping.
    #[must_use]
    pub fn needs_attention(&self) -> bool {
        self.customer_status.is_some_and(CustomerStatus::needs_attention)
    }

    /// Claims that still need an order.
    pub fn pending_claims(&self) -> impl Iterator<Item = &MatchedClaim> {
        self.matched.iter().filter(|c| !c.already_ordered)
    }
}

/// Match every comment against the phase products.
///
/// Output keeps the comments' chronological order so that orders created from
/// it consume prepared quantity in the order viewers claimed.
#[must_use]
pub fn match_comments<'a>(
    comments: &[CommentInput<'a>],
    context: &MatchContext<'a>,
) -> Vec<CommentMatch> {
    let mut sorted: Vec<&CommentInput<'a>> = comments.iter().collect();
    sorted.sort_by(|a, b| a.created_time.cmp(&b.created_time).then_with(|| a.id.cmp(b.id)));

    sorted
        .into_iter()
        .map(|comment| match_comment(comment, context))
        .collect()
}

fn match_comment<'a>(comment: &CommentInput<'a>, context: &MatchContext<'a>) -> CommentMatch {
    let mut matched = Vec::new();
    let mut unknown_codes = Vec::new();

    for claim in extract_claims(comment.message) {
        match context.products.get(&claim.index) {
            Some(&product_id) => matched.push(MatchedClaim {
                already_ordered: context.linked.contains(&(comment.id, product_id)),
                session_index: claim.index,
                product_id,
                quantity: claim.quantity,
            }),
            None => unknown_codes.push(claim.index),
        }
    }

    CommentMatch {
        comment_id: comment.id.to_string(),
        from_id: comment.from_id.map(String::from),
        from_name: comment.from_name.map(String::from),
        message: comment.message.to_string(),
        created_time: comment.created_time,
        matched,
        unknown_codes,
        phone: Phone::find_in(comment.message),
        customer_status: comment
            .from_id
            .and_then(|id| context.statuses.get(id).copied()),
    }
}

/// Counts shown above the comment list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    /// Comments examined.
    pub comments: usize,
    /// Comments claiming at least one product.
    pub with_claims: usize,
    /// Comments whose claims all have orders.
    pub fully_ordered: usize,
    /// Claims still waiting for an order.
    pub pending_claims: usize,
    /// Comments that only mention unknown codes.
    pub unknown_only: usize,
}

/// Summarize a match result.
#[must_use]
pub fn summarize(matches: &[CommentMatch]) -> MatchSummary {
    matches.iter().fold(
        MatchSummary {
            comments: matches.len(),
            ..MatchSummary::default()
        },
        |mut summary, m| {
            if m.has_claims() {
                summary.with_claims += 1;
            } else if !m.unknown_codes.is_empty() {
                summary.unknown_only += 1;
            }
            if m.fully_ordered() {
                summary.fully_ordered += 1;
            }
            summary.pending_claims += m.pending_claims().count();
            summary
        },
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, second).single().unwrap()
    }

    fn comment<'a>(id: &'a str, message: &'a str, from: &'a str, second: u32) -> CommentInput<'a> {
        CommentInput {
            id,
            message,
            from_id: Some(from),
            from_name: Some("Viewer"),
            created_time: at(second),
        }
    }

    fn codes() -> (SessionIndex, SessionIndex) {
        (SessionIndex::parse("A1").unwrap(), SessionIndex::parse("B2").unwrap())
    }

    #[test]
    fn test_matches_known_codes() {
        let (a1, b2) = codes();
        let products = [
            ProductInput { id: LiveProductId::new(1), session_index: &a1 },
            ProductInput { id: LiveProductId::new(2), session_index: &b2 },
        ];
        let context = MatchContext::new(&products);

        let result = match_comments(&[comment("c1", "a1 x2 b2", "u1", 0)], &context);

        assert_eq!(result.len(), 1);
        let m = &result[0];
        assert_eq!(m.matched.len(), 2);
        assert_eq!(m.matched[0].product_id, LiveProductId::new(1));
        assert_eq!(m.matched[0].quantity, 2);
        assert_eq!(m.matched[1].product_id, LiveProductId::new(2));
        assert!(m.unknown_codes.is_empty());
    }

    #[test]
    fn test_unknown_codes_are_reported() {
        let (a1, _) = codes();
        let products = [ProductInput { id: LiveProductId::new(1), session_index: &a1 }];
        let context = MatchContext::new(&products);

        let result = match_comments(&[comment("c1", "Z9 nha", "u1", 0)], &context);

        assert!(!result[0].has_claims());
        assert_eq!(result[0].unknown_codes[0].as_str(), "Z9");
    }

    #[test]
    fn test_linked_comments_are_already_ordered() {
        let (a1, b2) = codes();
        let products = [
            ProductInput { id: LiveProductId::new(1), session_index: &a1 },
            ProductInput { id: LiveProductId::new(2), session_index: &b2 },
        ];
        let context =
            MatchContext::new(&products).with_linked([("c1", LiveProductId::new(1))]);

        let result = match_comments(&[comment("c1", "A1 B2", "u1", 0)], &context);

        assert!(result[0].matched[0].already_ordered);
        assert!(!result[0].matched[1].already_ordered);
        assert!(!result[0].fully_ordered());
        assert_eq!(result[0].pending_claims().count(), 1);
    }

    #[test]
    fn test_output_is_chronological() {
        let (a1, _) = codes();
        let products = [ProductInput { id: LiveProductId::new(1), session_index: &a1 }];
        let context = MatchContext::new(&products);

        let result = match_comments(
            &[comment("late", "A1", "u1", 30), comment("early", "A1", "u2", 5)],
            &context,
        );

        assert_eq!(result[0].comment_id, "early");
        assert_eq!(result[1].comment_id, "late");
    }

    #[test]
    fn test_phone_and_status_are_attached() {
        let (a1, _) = codes();
        let products = [ProductInput { id: LiveProductId::new(1), session_index: &a1 }];
        let context = MatchContext::new(&products)
            .with_statuses([("u1", CustomerStatus::Blacklisted)]);

        let result = match_comments(&[comment("c1", "A1 0912345678", "u1", 0)], &context);

        assert_eq!(result[0].phone.as_ref().map(Phone::as_str), Some("0912345678"));
        assert_eq!(result[0].customer_status, Some(CustomerStatus::Blacklisted));
        assert!(result[0].needs_attention());
    }

    #[test]
    fn test_summary_counts() {
        let (a1, _) = codes();
        let products = [ProductInput { id: LiveProductId::new(1), session_index: &a1 }];
        let context =
            MatchContext::new(&products).with_linked([("c2", LiveProductId::new(1))]);

        let result = match_comments(
            &[
                comment("c1", "A1", "u1", 0),
                comment("c2", "A1", "u2", 1),
                comment("c3", "Q5", "u3", 2),
                comment("c4", "dep qua", "u4", 3),
            ],
            &context,
        );
        let summary = summarize(&result);

        assert_eq!(
            summary,
            MatchSummary {
                comments: 4,
                with_claims: 2,
                fully_ordered: 1,
                pending_claims: 1,
                unknown_only: 1,
            }
        );
    }
}
