use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Resume position shared by every recency-ordered index: creation time in
/// milliseconds, then entity id as the tie breaker.
///
/// The string form is fixed width, so lexicographic order of encoded keys is
/// the same as the derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub created_at_ms: i64,
    pub id: Uuid,
}

impl SortKey {
    pub fn new(created_at: DateTime<Utc>, id: Uuid) -> Self {
        Self {
            created_at_ms: created_at.timestamp_millis().max(0),
            id,
        }
    }

    pub fn encode(&self) -> String {
        format!("{:020}#{}", self.created_at_ms, self.id.hyphenated())
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (millis, id) = s.split_once('#')?;
        if millis.len() != 20 {
            return None;
        }
        Some(Self {
            created_at_ms: millis.parse().ok()?,
            id: Uuid::parse_str(id).ok()?,
        })
    }
}
