use std::collections::BTreeSet;

use chrono::{Duration, NaiveDateTime};

use crate::error::QaError;

/// Upper limit on enumerated expected timestamps, to keep a malformed
/// frequency from turning gap detection into an unbounded loop.
const MAX_EXPECTED_STEPS: i64 = 2_000_000;

/// Parse a sampling-frequency string like `10min`, `1h`, `30s`, or `1d`.
pub fn parse_freq(freq: &str) -> Result<Duration, QaError> {
    let freq = freq.trim();
    let split = freq
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(freq.len());
    let (digits, unit) = freq.split_at(split);

    let count: i64 = if digits.is_empty() {
        1
    } else {
        digits
            .parse()
            .map_err(|_| QaError::Check(format!("invalid frequency '{freq}'")))?
    };
    if count <= 0 {
        return Err(QaError::Check(format!("invalid frequency '{freq}'")));
    }

    match unit.to_ascii_lowercase().as_str() {
        "s" | "sec" => Ok(Duration::seconds(count)),
        "min" | "t" | "m" => Ok(Duration::minutes(count)),
        "h" | "hr" | "hour" => Ok(Duration::hours(count)),
        "d" | "day" => Ok(Duration::days(count)),
        other => Err(QaError::Check(format!(
            "unsupported frequency unit '{other}' in '{freq}'"
        ))),
    }
}

/// Enumerate expected timestamps between the observed minimum and maximum at
/// the given frequency and return those not present. Advisory only: rows are
/// never synthesized for the gaps found.
pub fn find_gaps(stamps: &[NaiveDateTime], freq: Duration) -> Result<Vec<NaiveDateTime>, QaError> {
    if stamps.len() < 2 {
        return Ok(Vec::new());
    }

    let present: BTreeSet<NaiveDateTime> = stamps.iter().copied().collect();
    let start = *present.iter().next().unwrap_or(&stamps[0]);
    let end = *present.iter().next_back().unwrap_or(&stamps[0]);

    let span = end - start;
    let freq_secs = freq.num_seconds().max(1);
    if span.num_seconds() / freq_secs > MAX_EXPECTED_STEPS {
        return Err(QaError::Check(format!(
            "frequency {}s is too fine for the {}s span of the dataset",
            freq_secs,
            span.num_seconds()
        )));
    }

    let mut missing = Vec::new();
    let mut expected = start;
    while expected <= end {
        if !present.contains(&expected) {
            missing.push(expected);
        }
        expected += freq;
    }
    Ok(missing)
}
