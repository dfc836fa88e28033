//! Proportional date remapping for records that predate the tracking window.
//!
//! When a lifetime of history is imported retroactively (e.g. every movie
//! ever watched, logged against its release year), everything before the
//! account existed would otherwise pile up at the window edge or sort into
//! decades the feed never covered. The timeshift engine spreads those records
//! proportionally across the window between `tracking_start` and
//! `tracking_end`, preserving their relative chronological order.
//!
//! Only the date component moves; time-of-day and the UTC offset are kept.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone};

use crate::error::{Error, Result};
use crate::item::FeedItem;

/// Deterministic date remapping for pre-tracking records.
#[derive(Debug, Clone)]
pub struct Timeshift {
    /// Only records with one of these ftypes are eligible.
    ftypes: HashSet<String>,
    /// Earliest date ever considered; anything before maps to
    /// `tracking_start` exactly.
    anchor: NaiveDate,
    /// Start of the window shifted records land in.
    tracking_start: NaiveDate,
    /// End of the window, typically the account-creation date. Records on or
    /// after this date are left alone.
    tracking_end: NaiveDate,
}

impl Timeshift {
    /// Default anchor: far enough back to predate any plausible release date.
    pub fn default_anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(1940, 1, 1).expect("static date is valid")
    }

    /// Build an engine for the given window, validating its geometry.
    pub fn new(
        ftypes: HashSet<String>,
        anchor: NaiveDate,
        tracking_start: NaiveDate,
        tracking_end: NaiveDate,
    ) -> Result<Self> {
        if tracking_end <= anchor {
            return Err(Error::Validation(format!(
                "timeshift tracking_end {tracking_end} must be after anchor {anchor}"
            )));
        }
        if tracking_end < tracking_start {
            return Err(Error::Validation(format!(
                "timeshift tracking_end {tracking_end} is before tracking_start {tracking_start}"
            )));
        }
        Ok(Self {
            ftypes,
            anchor,
            tracking_start,
            tracking_end,
        })
    }

    /// Whether a record is eligible for shifting.
    pub fn matches(&self, item: &FeedItem) -> bool {
        self.ftypes.contains(&item.ftype) && item.when.date_naive() < self.tracking_end
    }

    /// Compute the remapped date for an eligible record.
    fn shifted_date(&self, item: &FeedItem) -> NaiveDate {
        let when = item.when.date_naive();
        if when < self.anchor {
            return self.tracking_start;
        }

        // Fraction of the way from the anchor to the window end, scaled onto
        // the window itself. Whole days only; the fractional remainder is
        // floored, so the anchor itself maps to tracking_start exactly.
        let elapsed = (when - self.anchor).num_days();
        let span = (self.tracking_end - self.anchor).num_days();
        let frac = elapsed as f64 / span as f64;
        let window = (self.tracking_end - self.tracking_start).num_days();
        let add = (frac * window as f64).floor() as i64;
        self.tracking_start + Duration::days(add)
    }

    /// Return a shifted copy of the record, or `None` when it is not
    /// eligible. Never mutates the input.
    pub fn apply(&self, item: &FeedItem) -> Option<FeedItem> {
        if !self.matches(item) {
            return None;
        }
        let new_date = self.shifted_date(item);
        tracing::debug!(
            ftype = %item.ftype,
            title = %item.title,
            from = %item.when.date_naive(),
            to = %new_date,
            "timeshift"
        );

        let local = NaiveDateTime::new(new_date, item.when.time());
        let when = item
            .when
            .offset()
            .from_local_datetime(&local)
            .single()
            .expect("fixed offsets map local times unambiguously");
        let mut shifted = item.clone();
        shifted.when = when;
        Some(shifted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset};

    fn engine() -> Timeshift {
        Timeshift::new(
            HashSet::from(["movie".to_string()]),
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        )
        .unwrap()
    }

    fn movie_at(when: &str) -> FeedItem {
        let when = DateTime::<FixedOffset>::parse_from_rfc3339(when).unwrap();
        FeedItem::new("trakt_1", "Up", "movie", when)
    }

    #[test]
    fn test_before_anchor_maps_to_tracking_start() {
        let shifted = engine().apply(&movie_at("1999-01-01T12:00:00+00:00")).unwrap();
        assert_eq!(
            shifted.when.date_naive(),
            NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_at_anchor_maps_to_tracking_start() {
        let shifted = engine().apply(&movie_at("2000-01-01T12:00:00+00:00")).unwrap();
        assert_eq!(
            shifted.when.date_naive(),
            NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_at_tracking_end_is_not_eligible() {
        assert!(engine().apply(&movie_at("2020-01-01T00:00:00+00:00")).is_none());
    }

    #[test]
    fn test_midpoint_lands_mid_window() {
        // 2010-01-01 is halfway between anchor and end, so it lands halfway
        // into the 2010..2020 window.
        let shifted = engine().apply(&movie_at("2010-01-01T08:00:00+00:00")).unwrap();
        let date = shifted.when.date_naive();
        assert!(date > NaiveDate::from_ymd_opt(2014, 12, 1).unwrap());
        assert!(date < NaiveDate::from_ymd_opt(2015, 2, 1).unwrap());
    }

    #[test]
    fn test_relative_order_preserved() {
        let a = engine().apply(&movie_at("1980-06-01T00:00:00+00:00")).unwrap();
        let b = engine().apply(&movie_at("2001-06-01T00:00:00+00:00")).unwrap();
        assert!(a.when < b.when);
    }

    #[test]
    fn test_time_and_offset_preserved() {
        let item = movie_at("2005-03-04T21:15:30+05:30");
        let shifted = engine().apply(&item).unwrap();
        assert_eq!(shifted.when.time(), item.when.time());
        assert_eq!(shifted.when.offset(), item.when.offset());
        assert_ne!(shifted.when.date_naive(), item.when.date_naive());
    }

    #[test]
    fn test_ineligible_ftype_untouched() {
        let mut item = movie_at("2005-03-04T21:15:30+00:00");
        item.ftype = "listen".to_string();
        assert!(engine().apply(&item).is_none());
    }

    #[test]
    fn test_input_is_not_mutated() {
        let item = movie_at("2005-03-04T21:15:30+00:00");
        let before = item.clone();
        let _ = engine().apply(&item);
        assert_eq!(item, before);
    }

    #[test]
    fn test_window_geometry_validated() {
        let ftypes = HashSet::from(["movie".to_string()]);
        let d = |y| NaiveDate::from_ymd_opt(y, 1, 1).unwrap();
        assert!(Timeshift::new(ftypes.clone(), d(2020), d(2010), d(2015)).is_err());
        assert!(Timeshift::new(ftypes, d(2000), d(2019), d(2015)).is_err());
    }
}
