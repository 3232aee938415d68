//! Graph API response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use liveshop_core::matching::CommentInput;

/// A video on the page, live or archived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookVideo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `LIVE`, `VOD`, `SCHEDULED_UNPUBLISHED`, ...
    #[serde(default)]
    pub live_status: Option<String>,
    #[serde(default)]
    pub permalink_url: Option<String>,
    #[serde(default, with = "graph_time::option")]
    pub created_time: Option<DateTime<Utc>>,
}

impl FacebookVideo {
    /// Whether the video is currently broadcasting.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live_status.as_deref() == Some("LIVE")
    }
}

/// Commenter shown on a comment. Absent when the Graph API withholds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub id: String,
    pub name: String,
}

/// A comment on a live video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookComment {
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub from: Option<CommentAuthor>,
    #[serde(with = "graph_time")]
    pub created_time: DateTime<Utc>,
}

impl FacebookComment {
    /// Borrow the comment as matcher input.
    #[must_use]
    pub fn as_input(&self) -> CommentInput<'_> {
        CommentInput {
            id: &self.id,
            message: &self.message,
            from_id: self.from.as_ref().map(|f| f.id.as_str()),
            from_name: self.from.as_ref().map(|f| f.name.as_str()),
            created_time: self.created_time,
        }
    }
}

/// One page of a Graph edge.
#[derive(Debug, Deserialize)]
pub(crate) struct GraphPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Paging {
    #[serde(default)]
    pub cursors: Option<Cursors>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Cursors {
    #[serde(default)]
    pub after: Option<String>,
}

impl<T> GraphPage<T> {
    /// Cursor of the following page, if the Graph API says there is one.
    pub(crate) fn next_cursor(&self) -> Option<&str> {
        let paging = self.paging.as_ref()?;
        paging.next.as_ref()?;
        paging.cursors.as_ref()?.after.as_deref()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphErrorBody {
    pub error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphErrorDetail {
    pub message: String,
    #[serde(default)]
    pub code: i64,
}

/// Graph timestamps look like `2024-03-01T09:15:00+0000`.
pub(crate) mod graph_time {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

    pub fn parse(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_str(value, FORMAT).map(|t| t.with_timezone(&Utc))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(t) => s.serialize_some(&t.to_rfc3339()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_comment_deserializes_graph_timestamp() {
        let comment: FacebookComment = serde_json::from_str(
            r#"{
                "id": "123_456",
                "message": "A1 x2",
                "from": {"id": "999", "name": "Lan"},
                "created_time": "2024-03-01T09:15:00+0000"
            }"#,
        )
        .unwrap();

        assert_eq!(
            comment.created_time,
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap()
        );
        let input = comment.as_input();
        assert_eq!(input.from_id, Some("999"));
        assert_eq!(input.message, "A1 x2");
    }

    #[test]
    fn test_comment_without_author_or_message() {
        let comment: FacebookComment = serde_json::from_str(
            r#"{"id": "1", "created_time": "2024-03-01T09:15:00+0700"}"#,
        )
        .unwrap();

        assert!(comment.from.is_none());
        assert!(comment.message.is_empty());
        assert_eq!(
            comment.created_time,
            Utc.with_ymd_and_hms(2024, 3, 1, 2, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_next_cursor_requires_next_link() {
        let last: GraphPage<FacebookComment> = serde_json::from_str(
            r#"{"data": [], "paging": {"cursors": {"before": "a", "after": "b"}}}"#,
        )
        .unwrap();
        assert_eq!(last.next_cursor(), None);

        let more: GraphPage<FacebookComment> = serde_json::from_str(
            r#"{"data": [], "paging": {"cursors": {"after": "b"}, "next": "https://x"}}"#,
        )
        .unwrap();
        assert_eq!(more.next_cursor(), Some("b"));
    }

    #[test]
    fn test_video_is_live() {
        let video: FacebookVideo =
            serde_json::from_str(r#"{"id": "v1", "live_status": "LIVE"}"#).unwrap();
        assert!(video.is_live());
        assert!(video.created_time.is_none());
    }
}
