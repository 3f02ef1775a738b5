//! Published release descriptors.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An immutable record identifying one published version of the project.
///
/// Descriptors are supplied by a `ReleaseSource` in ascending publish order
/// and the tag is unique within a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    /// Git tag the release points at.
    #[serde(rename = "tag_name")]
    pub tag: String,

    /// Human-readable release title.
    pub name: String,

    /// Full publish timestamp, used for ordering.
    pub published_at: DateTime<Utc>,

    /// Publish date (UTC calendar day).
    pub published_date: NaiveDate,

    /// Web URL of the release page.
    pub url: String,
}

impl ReleaseDescriptor {
    /// Create a descriptor, deriving the publish date from the timestamp.
    pub fn new(
        tag: impl Into<String>,
        name: impl Into<String>,
        published_at: DateTime<Utc>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            name: name.into(),
            published_date: published_at.date_naive(),
            published_at,
            url: url.into(),
        }
    }

    /// Create a descriptor published at midnight UTC on the given day.
    pub fn on_date(tag: impl Into<String>, date: NaiveDate) -> Self {
        let tag = tag.into();
        let published_at = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        Self::new(tag.clone(), tag, published_at, String::new())
    }
}
