use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::error::TimestampError;
use crate::models::LotRecord;

const OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// A registry timestamp.
///
/// `Raw` holds the text as received: either not normalized yet, or text that
/// could not be parsed and is kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
    Raw(String),
    Absolute(NaiveDateTime),
}

impl Timestamp {
    /// Point in time usable for ordering, without any offset applied
    pub fn instant(&self) -> Option<NaiveDateTime> {
        match self {
            Timestamp::Absolute(dt) => Some(*dt),
            Timestamp::Raw(raw) => parse_timestamp(raw).ok(),
        }
    }

    /// Fold the record's UTC offset in. Already absolute values are kept.
    pub fn normalize(self, offset_minutes: Option<i64>) -> Self {
        match self {
            Timestamp::Raw(raw) => normalize_timestamp(&raw, offset_minutes),
            absolute => absolute,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Raw(raw) => f.write_str(raw),
            Timestamp::Absolute(dt) => write!(f, "{}", dt.format(OUTPUT_FORMAT)),
        }
    }
}

/// Dataset cells carry the displayed form
impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse any timestamp shape the registry emits.
///
/// Zoned values are converted to their UTC wall clock; naive ones are taken as is.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, TimestampError> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_utc());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| TimestampError(raw.to_string()))
}

/// Apply a per-record offset (minutes) to a registry timestamp.
///
/// Unparseable input is logged and returned untouched as `Timestamp::Raw`.
pub fn normalize_timestamp(raw: &str, offset_minutes: Option<i64>) -> Timestamp {
    match parse_timestamp(raw) {
        Ok(dt) => {
            let shifted = offset_minutes
                .and_then(|minutes| dt.checked_add_signed(Duration::minutes(minutes)))
                .unwrap_or(dt);
            Timestamp::Absolute(shifted)
        }
        Err(e) => {
            warn!(error = %e, "timestamp left unnormalized");
            Timestamp::Raw(raw.to_string())
        }
    }
}

/// Fold the lot's offset into every timestamp it carries
pub fn normalize_lot_timestamps(lot: &mut LotRecord) {
    let offset = lot.timezone_offset;
    for field in [
        &mut lot.create_date,
        &mut lot.bid_end_time,
        &mut lot.auction_start_date,
        &mut lot.bid_start_date,
    ] {
        *field = field.take().map(|ts| ts.normalize(offset));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_offset_moves_wall_clock_forward() {
        let ts = normalize_timestamp("2024-01-01T00:00:00", Some(180));
        assert_eq!(ts.to_string(), "2024-01-01T03:00:00");
    }

    #[test]
    fn missing_offset_is_plain_parse() {
        for raw in ["2024-03-05T10:20:30", "2024-03-05T10:20:30.250Z", "2024-03-05"] {
            let ts = normalize_timestamp(raw, None);
            assert_eq!(ts, Timestamp::Absolute(parse_timestamp(raw).unwrap()));
        }
    }

    #[test]
    fn zoned_input_is_read_as_utc_before_offset() {
        let ts = normalize_timestamp("2024-06-30T21:00:00.000+00:00", Some(420));
        assert_eq!(ts.to_string(), "2024-07-01T04:00:00");

        let ts = normalize_timestamp("2024-06-30T23:00:00+02:00", None);
        assert_eq!(ts.to_string(), "2024-06-30T21:00:00");
    }

    #[test]
    fn garbage_is_kept_verbatim() {
        let ts = normalize_timestamp("скоро", Some(180));
        assert_eq!(ts, Timestamp::Raw("скоро".to_string()));
        assert_eq!(ts.instant(), None);
    }

    #[test]
    fn every_lot_timestamp_gets_the_offset() {
        let mut lot = crate::pipeline::test_support::lot_record("1", "50:10:000000:123");
        lot.timezone_offset = Some(240);
        lot.create_date = Some(Timestamp::Raw("2024-01-01T00:00:00.000Z".into()));
        lot.bid_start_date = Some(Timestamp::Raw("не указано".into()));

        normalize_lot_timestamps(&mut lot);

        assert_eq!(lot.create_date.unwrap().to_string(), "2024-01-01T04:00:00");
        assert_eq!(lot.bid_start_date, Some(Timestamp::Raw("не указано".into())));
        assert_eq!(lot.bid_end_time, None);
    }

    #[test]
    fn normalize_is_a_no_op_on_absolute_values() {
        let once = Timestamp::Raw("2024-01-01T00:00:00".into()).normalize(Some(60));
        let twice = once.clone().normalize(Some(60));
        assert_eq!(once, twice);
    }
}
