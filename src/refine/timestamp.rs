use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::QaError;
use crate::table::{Table, Value};

/// Parsed time bases for one dataset, aligned with its rows.
///
/// `original` holds timestamps as written in the upload (local wall-clock for
/// naive inputs); `utc` holds the timezone-normalized equivalents. Both bases
/// are needed because duplicate and gap counts can differ across a DST fold.
#[derive(Debug, Clone)]
pub struct NormalizedTime {
    pub original: Vec<NaiveDateTime>,
    pub utc: Vec<NaiveDateTime>,
}

impl NormalizedTime {
    /// Apply a row-retention mask, keeping both bases aligned with the table.
    pub fn retain(&mut self, keep: &[bool]) {
        let mut iter = keep.iter();
        self.original.retain(|_| *iter.next().unwrap_or(&true));
        let mut iter = keep.iter();
        self.utc.retain(|_| *iter.next().unwrap_or(&true));
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];

/// Parse one raw timestamp, returning (original wall-clock, UTC-naive).
fn parse_one(raw: &str, local_tz: Tz) -> Result<(NaiveDateTime, NaiveDateTime), String> {
    // Offset-bearing inputs carry their own zone; the local_tz only applies
    // to naive inputs.
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Ok((dt.naive_local(), dt.with_timezone(&Utc).naive_utc()));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            // Ambiguous local times (DST fold) resolve to the earliest valid
            // instant; nonexistent local times are a conversion failure.
            let localized = local_tz.from_local_datetime(&naive).earliest();
            return match localized {
                Some(dt) => Ok((naive, dt.with_timezone(&Utc).naive_utc())),
                None => Err(format!("nonexistent local time '{raw}' in {local_tz}")),
            };
        }
    }

    Err(format!("unparseable datetime '{raw}'"))
}

/// Convert a raw time column to canonical UTC-naive timestamps in place.
///
/// On success the table's time column is rewritten to `Value::Timestamp`
/// (UTC) and both time bases are returned for downstream duplicate and gap
/// checks. Any unparseable or unlocalizable value fails the whole step; the
/// caller records the failure and continues with the unconverted dataset.
pub fn normalize_datetime(
    table: &mut Table,
    time_col: &str,
    local_tz: Tz,
) -> Result<NormalizedTime, QaError> {
    let values = table
        .column(time_col)
        .ok_or_else(|| QaError::Conversion(format!("time column '{time_col}' not found")))?;

    let mut original = Vec::with_capacity(values.len());
    let mut utc = Vec::with_capacity(values.len());
    let mut failures = 0usize;
    let mut first_error: Option<String> = None;

    for value in &values {
        let parsed = match value {
            // Idempotent over already-converted columns.
            Value::Timestamp(ts) => Ok((*ts, *ts)),
            Value::Null => Err("missing timestamp".to_string()),
            other => parse_one(other.render().trim(), local_tz),
        };
        match parsed {
            Ok((orig, utc_ts)) => {
                original.push(orig);
                utc.push(utc_ts);
            }
            Err(message) => {
                failures += 1;
                first_error.get_or_insert(message);
            }
        }
    }

    if failures > 0 {
        let detail = first_error.unwrap_or_else(|| "unknown parse failure".to_string());
        return Err(QaError::Conversion(format!(
            "{failures} of {} values could not be converted: {detail}",
            values.len()
        )));
    }

    table.set_column(
        time_col,
        utc.iter().map(|ts| Value::Timestamp(*ts)).collect(),
    );

    Ok(NormalizedTime { original, utc })
}
