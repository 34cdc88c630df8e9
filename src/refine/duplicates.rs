use std::collections::{HashMap, HashSet};

use crate::table::{Table, Value};

/// Build per-row duplicate keys from a time base and an optional identifier
/// column. Multi-entity datasets (SCADA) share timestamps across turbines, so
/// the identifier is part of the key.
pub fn build_keys(times: &[Value], ids: Option<&[Value]>) -> Vec<String> {
    times
        .iter()
        .enumerate()
        .map(|(i, time)| match ids {
            Some(ids) => format!("{}|{}", time.render(), ids[i].render()),
            None => time.render(),
        })
        .collect()
}

/// Count rows whose key has already been seen, i.e. every occurrence after
/// the first.
pub fn duplicate_count(keys: &[String]) -> usize {
    let mut seen = HashSet::new();
    keys.iter().filter(|key| !seen.insert(key.as_str())).count()
}

/// Drop rows sharing a duplicate key, keeping the last occurrence in original
/// row order. Returns the retention mask and the number of rows dropped; the
/// caller uses the mask to keep auxiliary per-row state aligned.
pub fn drop_duplicates_keep_last(table: &mut Table, keys: &[String]) -> (Vec<bool>, usize) {
    let mut last_index: HashMap<&str, usize> = HashMap::new();
    for (i, key) in keys.iter().enumerate() {
        last_index.insert(key.as_str(), i);
    }

    let keep: Vec<bool> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| last_index[key.as_str()] == i)
        .collect();
    let dropped = keep.iter().filter(|k| !**k).count();

    table.retain_rows(&keep);
    (keep, dropped)
}
