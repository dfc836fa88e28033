//! The canonical feed record and its validation contract.
//!
//! A [`FeedItem`] is one normalized activity record: a scrobble, an episode,
//! a movie, a game session, a chapter. Source adapters construct these, the
//! orchestrator validates them with [`FeedItem::check`], and everything
//! downstream (staging, sync, query) treats them as immutable.
//!
//! # Wire format
//!
//! Records serialize as JSON objects, one per line in a staging batch. The
//! `when` field accepts either integer epoch seconds (taken as UTC) or an
//! ISO-8601 timestamp carrying an explicit UTC offset, and is always written
//! back as RFC 3339 with its offset so a round trip is lossless. A timestamp
//! without an offset fails deserialization.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::BLUR_FLAG;

/// One normalized activity record.
///
/// `id` is globally unique and namespaced per source (e.g. `trakt_<n>`).
/// `ftype` is an open-ended category tag, not a closed enum: new sources may
/// introduce new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Unique id, namespaced by the producing source.
    pub id: String,
    /// Name of the entry: track, episode name, movie title.
    pub title: String,
    /// Category tag: scrobble, episode, movie, book, ...
    pub ftype: String,
    /// When the activity is attributed to. Must carry an explicit UTC offset.
    #[serde(with = "when_codec")]
    pub when: DateTime<FixedOffset>,
    /// Normalized rating out of 10, if rated.
    #[serde(default)]
    pub score: Option<f64>,
    /// Show name, or album name for a scrobble.
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Artist, author, or studio.
    #[serde(default)]
    pub creator: Option<String>,
    /// Grouping key for episodic media (a show, a book series).
    #[serde(default)]
    pub collection: Option<String>,
    /// e.g. season, or volume.
    #[serde(default)]
    pub part: Option<i64>,
    /// e.g. episode, or chapter.
    #[serde(default)]
    pub subpart: Option<i64>,
    /// When the underlying media was released.
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Free-form descriptors.
    #[serde(default)]
    pub tags: Vec<String>,
    /// System-set annotations (e.g. the blur flag). Additive only; no
    /// downstream stage removes a flag.
    #[serde(default)]
    pub flags: Vec<String>,
    /// Source-specific extras, passed through unexamined.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl FeedItem {
    /// Create a record with the required fields set and everything else empty.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        ftype: impl Into<String>,
        when: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ftype: ftype.into(),
            when,
            score: None,
            subtitle: None,
            creator: None,
            collection: None,
            part: None,
            subpart: None,
            release_date: None,
            url: None,
            image_url: None,
            tags: Vec::new(),
            flags: Vec::new(),
            data: Map::new(),
        }
    }

    /// Validate the record, normalizing as it goes.
    ///
    /// Blank `url`/`image_url` values become absent. A `score` outside
    /// `[0.0, 10.0]` is a validation error. The explicit-offset requirement
    /// on `when` is carried by the type itself; naive timestamps are rejected
    /// when a record is deserialized.
    ///
    /// Must be called once per record, immediately after creation and before
    /// the record may enter a staging batch.
    pub fn check(&mut self) -> Result<()> {
        if let Some(url) = &self.url {
            if url.trim().is_empty() {
                self.url = None;
            }
        }
        if let Some(image_url) = &self.image_url {
            if image_url.trim().is_empty() {
                self.image_url = None;
            }
        }
        if let Some(score) = self.score {
            if !(0.0..=10.0).contains(&score) {
                return Err(Error::Validation(format!(
                    "score {score} for '{}' is not within 0-10",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Append the blur flag.
    ///
    /// The flag instructs clients to blur the record's image, so it is only
    /// added when an image is present. Flags are additive; adding twice is a
    /// no-op.
    pub fn mark_blurred(&mut self) {
        if self.image_url.is_some() && !self.flags.iter().any(|f| f == BLUR_FLAG) {
            self.flags.push(BLUR_FLAG.to_string());
        }
    }

    /// Parse a record from one staging-batch line.
    pub fn from_json_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

mod when_codec {
    //! Serde codec for `when`: epoch seconds or RFC 3339 with offset in,
    //! RFC 3339 with offset out.

    use std::fmt;

    use chrono::{DateTime, FixedOffset, TimeZone, Utc};
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(when: &DateTime<FixedOffset>, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ser.serialize_str(&when.to_rfc3339())
    }

    pub fn deserialize<'de, D>(de: D) -> Result<DateTime<FixedOffset>, D::Error>
    where
        D: Deserializer<'de>,
    {
        de.deserialize_any(WhenVisitor)
    }

    struct WhenVisitor;

    impl Visitor<'_> for WhenVisitor {
        type Value = DateTime<FixedOffset>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "epoch seconds or an ISO-8601 timestamp with a UTC offset")
        }

        fn visit_i64<E>(self, secs: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Utc.timestamp_opt(secs, 0)
                .single()
                .map(|dt| dt.fixed_offset())
                .ok_or_else(|| E::custom(format!("epoch seconds out of range: {secs}")))
        }

        fn visit_u64<E>(self, secs: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            let secs =
                i64::try_from(secs).map_err(|_| E::custom("epoch seconds out of range"))?;
            self.visit_i64(secs)
        }

        fn visit_f64<E>(self, secs: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            // Sub-second precision is not meaningful for feed records.
            self.visit_i64(secs as i64)
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            DateTime::parse_from_rfc3339(value).map_err(|e| {
                E::custom(format!("'{value}' is not a timestamp with an offset: {e}"))
            })
        }
    }
}
