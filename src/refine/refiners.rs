//! Per-dataset refiners composing the QA primitives.
//!
//! Each refiner runs a fixed pipeline over a clone of its input table and
//! always completes: per-step failures degrade into report entries keyed by
//! the step that failed, never into an aborted refinement.

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use tracing::debug;

use crate::refine::config::{
    AssetConfig, Bounds, CurtailConfig, MeterConfig, ReanalysisConfig, ScadaConfig,
};
use crate::refine::duplicates::{build_keys, drop_duplicates_keep_last, duplicate_count};
use crate::refine::flags::{range_flag, unresponsive_flag};
use crate::refine::gaps::{find_gaps, parse_freq};
use crate::refine::report::QaReport;
use crate::refine::timestamp::{normalize_datetime, NormalizedTime};
use crate::table::{Table, Value};

fn render_stamps(stamps: &[NaiveDateTime]) -> Vec<String> {
    stamps
        .iter()
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .collect()
}

/// Shared prelude for time-series datasets: normalize the time column,
/// resolve duplicates, detect gaps. Returns the (possibly absent) normalized
/// time bases after duplicate removal.
fn apply_time_checks(
    df: &mut Table,
    report: &mut QaReport,
    time_col: &str,
    id_col: Option<&str>,
    local_tz: Tz,
    freq: &str,
) -> Option<NormalizedTime> {
    // 1. Convert the time column to UTC-naive timestamps.
    let mut norm = match normalize_datetime(df, time_col, local_tz) {
        Ok(norm) => {
            report.set_bool("datetime_converted", true);
            Some(norm)
        }
        Err(err) => {
            report.set_bool("datetime_converted", false);
            report.set_error("datetime_error", err);
            None
        }
    };

    // 2. Identify duplicates in both time bases, then drop keep-last.
    let ids = id_col.map(|col| df.column(col));
    match (df.column(time_col), &ids) {
        (Some(_), Some(None)) => {
            report.set_error(
                "duplicate_check_error",
                format!("identifier column '{}' not found", id_col.unwrap_or("")),
            );
        }
        (Some(times), _) => {
            let id_values = ids.clone().flatten();
            let original_keys = match &norm {
                Some(norm) => {
                    let rendered: Vec<Value> = norm
                        .original
                        .iter()
                        .map(|ts| Value::Timestamp(*ts))
                        .collect();
                    build_keys(&rendered, id_values.as_deref())
                }
                None => build_keys(&times, id_values.as_deref()),
            };
            report.set_count("duplicate_original_count", duplicate_count(&original_keys));
            let utc_count = match &norm {
                Some(norm) => {
                    let rendered: Vec<Value> =
                        norm.utc.iter().map(|ts| Value::Timestamp(*ts)).collect();
                    duplicate_count(&build_keys(&rendered, id_values.as_deref()))
                }
                None => 0,
            };
            report.set_count("duplicate_utc_count", utc_count);
        }
        (None, _) => {
            report.set_error(
                "duplicate_check_error",
                format!("time column '{time_col}' not found"),
            );
        }
    }

    // An expected-but-missing identifier column already produced an error
    // above; dropping keyed on time alone would merge distinct turbines.
    let id_missing = matches!(ids, Some(None));
    let dropped = match df.column(time_col) {
        Some(times) if !id_missing => {
            let id_values = ids.flatten();
            let keys = build_keys(&times, id_values.as_deref());
            let (keep, dropped) = drop_duplicates_keep_last(df, &keys);
            if let Some(norm) = norm.as_mut() {
                norm.retain(&keep);
            }
            dropped
        }
        _ => 0,
    };
    report.set_count("rows_dropped_duplicates", dropped);

    // 3. Detect gaps against the expected sampling frequency, post-drop.
    match &norm {
        Some(norm) => match parse_freq(freq) {
            Ok(step) => {
                let original_gaps = find_gaps(&norm.original, step);
                let utc_gaps = find_gaps(&norm.utc, step);
                match (original_gaps, utc_gaps) {
                    (Ok(original_gaps), Ok(utc_gaps)) => {
                        report.set_count("time_gaps_original_count", original_gaps.len());
                        report.set_count("time_gaps_utc_count", utc_gaps.len());
                        if !utc_gaps.is_empty() {
                            report.set_list("time_gap_timestamps_utc", render_stamps(&utc_gaps));
                        }
                    }
                    (Err(err), _) | (_, Err(err)) => {
                        report.set_error("gap_check_error", err);
                    }
                }
            }
            Err(err) => report.set_error("gap_check_error", err),
        },
        None => {
            report.set_error(
                "gap_check_error",
                format!("time column '{time_col}' was not converted; gap check skipped"),
            );
        }
    }

    norm
}

/// Apply one range check to a column if present, recording the outcome under
/// the given report keys. Missing columns are silently skipped: only columns
/// present in the upload are checked.
fn apply_range_check(
    df: &mut Table,
    report: &mut QaReport,
    col: &str,
    bounds: Bounds,
    flag_name: &str,
    count_key: &str,
    error_key: &str,
) -> bool {
    let Some(values) = df.column(col) else {
        return false;
    };
    match range_flag(&values, bounds) {
        Ok(flags) => {
            report.set_count(count_key, flags.iter().filter(|f| **f).count());
            df.push_column(flag_name, flags.into_iter().map(Value::Bool).collect());
            true
        }
        Err(err) => {
            report.set_error(error_key, err);
            false
        }
    }
}

fn apply_unresponsive_check(
    df: &mut Table,
    report: &mut QaReport,
    col: &str,
    threshold: usize,
    flag_name: &str,
    count_key: &str,
    error_key: &str,
) -> bool {
    let Some(values) = df.column(col) else {
        return false;
    };
    match unresponsive_flag(&values, threshold) {
        Ok(flags) => {
            report.set_count(count_key, flags.iter().filter(|f| **f).count());
            df.push_column(flag_name, flags.into_iter().map(Value::Bool).collect());
            true
        }
        Err(err) => {
            report.set_error(error_key, err);
            false
        }
    }
}

/// SCADA: normalize time, resolve duplicates on (time, turbine id), detect
/// gaps, range-flag power/wind speed/temperature, unresponsive-flag
/// power/wind speed.
pub fn refine_scada(table: &Table, local_tz: Tz, cfg: &ScadaConfig) -> (Table, QaReport) {
    let mut df = table.clone();
    let mut report = QaReport::new();

    apply_time_checks(
        &mut df,
        &mut report,
        &cfg.time_col,
        Some(&cfg.id_col),
        local_tz,
        &cfg.freq,
    );

    let mut flag_cols: Vec<String> = Vec::new();
    let range_checks = [
        (&cfg.power_col, cfg.power_range, "flag_power_range"),
        (&cfg.windspeed_col, cfg.windspeed_range, "flag_windspeed_range"),
        (&cfg.temp_col, cfg.temp_range, "flag_temp_range"),
    ];
    for (col, bounds, flag_name) in range_checks {
        let added = apply_range_check(
            &mut df,
            &mut report,
            col,
            bounds,
            flag_name,
            &format!("range_flag_{flag_name}_count"),
            &format!("range_flag_{flag_name}_error"),
        );
        if added {
            flag_cols.push(flag_name.to_string());
        }
    }

    let unresponsive_checks = [
        (&cfg.power_col, "flag_power_unresponsive"),
        (&cfg.windspeed_col, "flag_windspeed_unresponsive"),
    ];
    for (col, flag_name) in unresponsive_checks {
        let added = apply_unresponsive_check(
            &mut df,
            &mut report,
            col,
            cfg.unresponsive_threshold,
            flag_name,
            &format!("unresponsive_{flag_name}_count"),
            &format!("unresponsive_{flag_name}_error"),
        );
        if added {
            flag_cols.push(flag_name.to_string());
        }
    }

    report.set_list("flag_columns_added", flag_cols);
    report.set_count("final_row_count", df.n_rows());
    debug!(rows = df.n_rows(), "scada refinement complete");
    (df, report)
}

/// Meter: normalize time, resolve duplicates, detect gaps, range-flag energy.
pub fn refine_meter(table: &Table, local_tz: Tz, cfg: &MeterConfig) -> (Table, QaReport) {
    let mut df = table.clone();
    let mut report = QaReport::new();

    apply_time_checks(&mut df, &mut report, &cfg.time_col, None, local_tz, &cfg.freq);

    apply_range_check(
        &mut df,
        &mut report,
        &cfg.energy_col,
        cfg.energy_range,
        "flag_energy_range",
        "range_flag_energy_count",
        "range_flag_energy_error",
    );

    report.set_count("final_row_count", df.n_rows());
    debug!(rows = df.n_rows(), "meter refinement complete");
    (df, report)
}

/// Curtailment: normalize time, resolve duplicates, detect gaps, range-flag
/// availability and curtailment energy.
pub fn refine_curtail(table: &Table, local_tz: Tz, cfg: &CurtailConfig) -> (Table, QaReport) {
    let mut df = table.clone();
    let mut report = QaReport::new();

    apply_time_checks(&mut df, &mut report, &cfg.time_col, None, local_tz, &cfg.freq);

    let checks = [
        (&cfg.avail_col, cfg.avail_range, "flag_availability_range"),
        (&cfg.curtail_col, cfg.curtail_range, "flag_curtailment_range"),
    ];
    for (col, bounds, flag_name) in checks {
        apply_range_check(
            &mut df,
            &mut report,
            col,
            bounds,
            flag_name,
            &format!("{flag_name}_count"),
            &format!("{flag_name}_error"),
        );
    }

    report.set_count("final_row_count", df.n_rows());
    debug!(rows = df.n_rows(), "curtailment refinement complete");
    (df, report)
}

/// Asset: no time dimension. Count missing identifiers and range-flag
/// latitude, longitude, and rated power.
pub fn refine_asset(table: &Table, cfg: &AssetConfig) -> (Table, QaReport) {
    let mut df = table.clone();
    let mut report = QaReport::new();

    if let Some(ids) = df.column(&cfg.id_col) {
        let missing = ids
            .iter()
            .filter(|v| v.is_null() || v.render().trim().is_empty())
            .count();
        report.set_count("missing_asset_id_count", missing);
    }

    let checks = [
        (&cfg.latitude_col, cfg.latitude_range, "flag_latitude_range"),
        (&cfg.longitude_col, cfg.longitude_range, "flag_longitude_range"),
        (
            &cfg.rated_power_col,
            cfg.rated_power_range,
            "flag_rated_power_range",
        ),
    ];
    for (col, bounds, flag_name) in checks {
        apply_range_check(
            &mut df,
            &mut report,
            col,
            bounds,
            flag_name,
            &format!("{flag_name}_count"),
            &format!("{flag_name}_error"),
        );
    }

    report.set_count("final_row_count", df.n_rows());
    debug!(rows = df.n_rows(), "asset refinement complete");
    (df, report)
}

/// Reanalysis: one invocation per weather product. Normalize time, resolve
/// duplicates, detect hourly gaps, range-flag wind speed / direction /
/// temperature (Kelvin), unresponsive-flag wind speed.
pub fn refine_reanalysis(
    table: &Table,
    product: &str,
    local_tz: Tz,
    cfg: &ReanalysisConfig,
) -> (Table, QaReport) {
    let mut df = table.clone();
    let mut report = QaReport::new();

    apply_time_checks(&mut df, &mut report, &cfg.time_col, None, local_tz, &cfg.freq);

    let checks = [
        (&cfg.windspeed_col, cfg.windspeed_range, "flag_windspeed_range"),
        (&cfg.winddir_col, cfg.winddir_range, "flag_winddir_range"),
        (&cfg.temp_col, cfg.temp_range, "flag_temp_range"),
    ];
    for (col, bounds, flag_name) in checks {
        apply_range_check(
            &mut df,
            &mut report,
            col,
            bounds,
            flag_name,
            &format!("{flag_name}_count"),
            &format!("{flag_name}_error"),
        );
    }

    apply_unresponsive_check(
        &mut df,
        &mut report,
        &cfg.windspeed_col,
        cfg.unresponsive_threshold,
        "flag_windspeed_unresponsive",
        "unresponsive_windspeed_count",
        "unresponsive_windspeed_error",
    );

    report.set_text("product", product);
    report.set_count("final_row_count", df.n_rows());
    debug!(rows = df.n_rows(), product, "reanalysis refinement complete");
    (df, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Paris;

    fn scada_table(rows: &[(&str, &str, &str, &str, &str)]) -> Table {
        let mut csv = String::from("Date_time,Wind_turbine_name,P_avg,Ws_avg,Ot_avg\n");
        for (t, id, p, ws, temp) in rows {
            csv.push_str(&format!("{t},{id},{p},{ws},{temp}\n"));
        }
        Table::from_csv_bytes(csv.as_bytes()).unwrap()
    }

    #[test]
    fn scada_happy_path_reports_all_checks() {
        let table = scada_table(&[
            ("2014-01-01 00:00:00", "T1", "100.0", "7.1", "10.0"),
            ("2014-01-01 00:10:00", "T1", "105.0", "7.4", "10.1"),
            ("2014-01-01 00:20:00", "T1", "2500.0", "7.9", "10.2"),
        ]);
        let (df, report) = refine_scada(&table, Paris, &ScadaConfig::default());

        assert_eq!(report.get("datetime_converted").unwrap(), true);
        assert_eq!(report.count("duplicate_original_count"), Some(0));
        assert_eq!(report.count("rows_dropped_duplicates"), Some(0));
        assert_eq!(report.count("time_gaps_original_count"), Some(0));
        // One power reading above the 2200 kW bound.
        assert_eq!(report.count("range_flag_flag_power_range_count"), Some(1));
        assert_eq!(report.count("final_row_count"), Some(3));
        assert_eq!(df.n_rows(), 3);
        assert!(df.has_column("flag_power_range"));
        assert!(df.has_column("flag_windspeed_unresponsive"));
    }

    #[test]
    fn scada_final_row_count_matches_table() {
        let table = scada_table(&[
            ("2014-01-01 00:00:00", "T1", "100.0", "7.1", "10.0"),
            ("2014-01-01 00:00:00", "T1", "105.0", "7.4", "10.1"),
        ]);
        let (df, report) = refine_scada(&table, Paris, &ScadaConfig::default());
        assert_eq!(report.count("rows_dropped_duplicates"), Some(1));
        assert_eq!(report.count("final_row_count"), Some(df.n_rows()));
        assert_eq!(df.n_rows(), 1);
        // Keep-last: the surviving row carries the later payload.
        assert_eq!(df.column("P_avg").unwrap()[0].as_f64(), Some(105.0));
    }

    #[test]
    fn scada_bad_temperature_isolates_the_failing_check() {
        let table = scada_table(&[
            ("2014-01-01 00:00:00", "T1", "100.0", "7.1", "warm"),
            ("2014-01-01 00:10:00", "T1", "105.0", "7.4", "cold"),
        ]);
        let (df, report) = refine_scada(&table, Paris, &ScadaConfig::default());

        // The temperature range check fails but everything else still ran.
        assert!(report.contains_key("range_flag_flag_temp_range_error"));
        assert_eq!(report.count("range_flag_flag_power_range_count"), Some(0));
        assert_eq!(report.count("time_gaps_original_count"), Some(0));
        assert_eq!(report.count("rows_dropped_duplicates"), Some(0));
        assert!(!df.has_column("flag_temp_range"));
        assert!(df.has_column("flag_power_range"));
    }

    #[test]
    fn scada_unparseable_times_degrade_gracefully() {
        let table = scada_table(&[
            ("first", "T1", "100.0", "7.1", "10.0"),
            ("second", "T1", "105.0", "7.4", "10.1"),
        ]);
        let (df, report) = refine_scada(&table, Paris, &ScadaConfig::default());

        assert_eq!(report.get("datetime_converted").unwrap(), false);
        assert!(report.contains_key("datetime_error"));
        assert!(report.contains_key("gap_check_error"));
        // Duplicate resolution still works on the raw string base.
        assert_eq!(report.count("duplicate_original_count"), Some(0));
        assert_eq!(report.count("final_row_count"), Some(2));
        // Range flags are independent of the time column.
        assert!(df.has_column("flag_power_range"));
    }

    #[test]
    fn scada_missing_optional_column_is_skipped_silently() {
        let mut csv = String::from("Date_time,Wind_turbine_name,P_avg\n");
        csv.push_str("2014-01-01 00:00:00,T1,100.0\n");
        let table = Table::from_csv_bytes(csv.as_bytes()).unwrap();
        let (_, report) = refine_scada(&table, Paris, &ScadaConfig::default());

        assert!(!report.contains_key("range_flag_flag_windspeed_range_count"));
        assert!(!report.contains_key("range_flag_flag_windspeed_range_error"));
        assert!(report.contains_key("range_flag_flag_power_range_count"));
    }

    #[test]
    fn meter_reports_energy_range() {
        let csv = "time,MMTR_SupWh\n\
                   2014-01-01 00:00:00,500.0\n\
                   2014-01-01 00:10:00,-500.0\n";
        let table = Table::from_csv_bytes(csv.as_bytes()).unwrap();
        let (df, report) = refine_meter(&table, Paris, &MeterConfig::default());

        assert_eq!(report.count("range_flag_energy_count"), Some(1));
        assert!(df.has_column("flag_energy_range"));
        assert_eq!(report.count("final_row_count"), Some(2));
    }

    #[test]
    fn curtail_flags_both_energy_columns() {
        let csv = "time,IAVL_DnWh,IAVL_ExtPwrDnWh\n\
                   2014-01-01 00:00:00,100.0,-5.0\n";
        let table = Table::from_csv_bytes(csv.as_bytes()).unwrap();
        let (df, report) = refine_curtail(&table, Paris, &CurtailConfig::default());

        assert_eq!(report.count("flag_availability_range_count"), Some(0));
        assert_eq!(report.count("flag_curtailment_range_count"), Some(1));
        assert!(df.has_column("flag_availability_range"));
        assert!(df.has_column("flag_curtailment_range"));
    }

    #[test]
    fn asset_counts_missing_ids_and_flags_coordinates() {
        let csv = "asset_id,latitude,longitude,rated_power\n\
                   T1,48.45,5.59,2050.0\n\
                   ,95.0,5.60,2050.0\n";
        let table = Table::from_csv_bytes(csv.as_bytes()).unwrap();
        let (df, report) = refine_asset(&table, &AssetConfig::default());

        assert_eq!(report.count("missing_asset_id_count"), Some(1));
        assert_eq!(report.count("flag_latitude_range_count"), Some(1));
        assert_eq!(report.count("flag_longitude_range_count"), Some(0));
        assert_eq!(df.n_rows(), 2);
    }

    #[test]
    fn reanalysis_flags_frozen_windspeed() {
        let csv = "time,WMETR_HorWdSpd,WMETR_HorWdDir,WMETR_EnvTmp\n\
                   2014-01-01 00:00:00,6.2,180.0,283.0\n\
                   2014-01-01 01:00:00,6.2,181.0,283.1\n\
                   2014-01-01 02:00:00,6.2,182.0,283.2\n\
                   2014-01-01 03:00:00,6.8,183.0,283.3\n";
        let table = Table::from_csv_bytes(csv.as_bytes()).unwrap();
        let (df, report) =
            refine_reanalysis(&table, "era5", Paris, &ReanalysisConfig::default());

        assert_eq!(report.get("product").and_then(|v| v.as_str()), Some("era5"));
        assert_eq!(report.count("unresponsive_windspeed_count"), Some(3));
        assert_eq!(report.count("time_gaps_utc_count"), Some(0));
        assert!(df.has_column("flag_windspeed_unresponsive"));
        assert!(df.has_column("flag_temp_range"));
    }

    #[test]
    fn refiner_is_idempotent_over_its_own_output() {
        let table = scada_table(&[
            ("2014-01-01 00:00:00", "T1", "100.0", "7.1", "10.0"),
            ("2014-01-01 00:00:00", "T1", "105.0", "7.4", "10.1"),
            ("2014-01-01 00:20:00", "T1", "110.0", "7.9", "10.2"),
        ]);
        let cfg = ScadaConfig::default();
        let (first, first_report) = refine_scada(&table, Paris, &cfg);
        assert_eq!(first_report.count("rows_dropped_duplicates"), Some(1));

        // Flag columns from the first pass collide with the second pass's
        // appends, so strip them the way a re-upload of cleaned data would.
        let mut csv = Vec::new();
        first.write_csv(&mut csv).unwrap();
        let mut reread = Table::from_csv_bytes(&csv).unwrap();
        for flag in [
            "flag_power_range",
            "flag_windspeed_range",
            "flag_temp_range",
            "flag_power_unresponsive",
            "flag_windspeed_unresponsive",
        ] {
            let keep: Vec<String> = reread
                .column_names()
                .iter()
                .filter(|c| c.as_str() != flag)
                .cloned()
                .collect();
            let mut trimmed = Table::new(keep.clone());
            for row in reread.rows() {
                let projected: Vec<Value> = keep
                    .iter()
                    .map(|c| {
                        let idx = reread
                            .column_names()
                            .iter()
                            .position(|n| n == c)
                            .unwrap();
                        row[idx].clone()
                    })
                    .collect();
                trimmed.push_row(projected);
            }
            reread = trimmed;
        }

        let (second, second_report) = refine_scada(&reread, Paris, &cfg);
        assert_eq!(second_report.count("rows_dropped_duplicates"), Some(0));
        assert_eq!(second_report.count("duplicate_original_count"), Some(0));
        assert_eq!(second.n_rows(), first.n_rows());
    }
}
