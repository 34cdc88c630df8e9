use anyhow::Result;
use chrono_tz::Europe::Paris;

use windplant_qa::refine::{refine_all, RefineConfig, RefineInputs};
use windplant_qa::table::Table;

fn table(csv: &str) -> Result<Table> {
    Ok(Table::from_csv_bytes(csv.as_bytes())?)
}

#[test]
fn duplicate_and_gap_scenario() -> Result<()> {
    // Duplicate timestamp at 09:00 for turbine T1 (payloads 100 then 105),
    // then a jump straight to 10:00 against a 10-minute expected frequency.
    let scada = table(
        "Date_time,Wind_turbine_name,P_avg,Ws_avg,Ot_avg\n\
         2014-01-01 09:00:00,T1,100.0,7.1,10.0\n\
         2014-01-01 09:00:00,T1,105.0,7.2,10.1\n\
         2014-01-01 10:00:00,T1,110.0,7.3,10.2\n",
    )?;

    let inputs = RefineInputs {
        scada,
        ..Default::default()
    };
    let output = refine_all(&inputs, Paris, &RefineConfig::default());
    let report = &output.reports.scada;

    assert_eq!(report.count("rows_dropped_duplicates"), Some(1));
    assert_eq!(report.count("duplicate_original_count"), Some(1));
    assert!(report.count("time_gaps_original_count").unwrap() >= 2);
    assert_eq!(report.count("time_gaps_utc_count"), Some(5));
    assert_eq!(report.count("final_row_count"), Some(2));
    assert_eq!(output.tables.scada.n_rows(), 2);

    // Keep-last: the surviving 09:00 row carries power 105.
    let power = output.tables.scada.column("P_avg").unwrap();
    assert_eq!(power[0].as_f64(), Some(105.0));

    // The missing UTC timestamps are listed literally.
    let gaps = report.get("time_gap_timestamps_utc").unwrap();
    assert_eq!(gaps.as_array().unwrap().len(), 5);
    Ok(())
}

#[test]
fn partial_failure_is_isolated_per_dataset_and_per_check() -> Result<()> {
    // SCADA temperature entirely non-numeric: the temp range check fails,
    // everything else must still be produced.
    let scada = table(
        "Date_time,Wind_turbine_name,P_avg,Ws_avg,Ot_avg\n\
         2014-01-01 09:00:00,T1,100.0,7.1,warm\n\
         2014-01-01 09:00:00,T1,105.0,7.2,cold\n\
         2014-01-01 09:20:00,T1,110.0,7.3,mild\n",
    )?;
    let meter = table(
        "time,MMTR_SupWh\n\
         2014-01-01 09:00:00,500.0\n\
         2014-01-01 09:10:00,510.0\n",
    )?;
    let asset = table(
        "asset_id,latitude,longitude,rated_power\n\
         T1,48.45,5.59,2050.0\n",
    )?;

    let inputs = RefineInputs {
        scada,
        meter: Some(meter),
        asset: Some(asset),
        ..Default::default()
    };
    let output = refine_all(&inputs, Paris, &RefineConfig::default());

    let scada_report = &output.reports.scada;
    assert!(scada_report.contains_key("range_flag_flag_temp_range_error"));
    assert_eq!(scada_report.count("rows_dropped_duplicates"), Some(1));
    assert_eq!(scada_report.count("time_gaps_utc_count"), Some(1));
    assert_eq!(
        scada_report.count("range_flag_flag_power_range_count"),
        Some(0)
    );

    // Other datasets refined normally.
    let meter_report = output.reports.meter.as_ref().unwrap();
    assert_eq!(meter_report.count("range_flag_energy_count"), Some(0));
    assert_eq!(meter_report.count("final_row_count"), Some(2));
    let asset_report = output.reports.asset.as_ref().unwrap();
    assert_eq!(asset_report.count("missing_asset_id_count"), Some(0));
    Ok(())
}

#[test]
fn full_batch_produces_parallel_reports() -> Result<()> {
    let scada = table(
        "Date_time,Wind_turbine_name,P_avg,Ws_avg,Ot_avg\n\
         2014-01-01 00:00:00,T1,100.0,7.1,10.0\n\
         2014-01-01 00:10:00,T1,105.0,7.2,10.1\n",
    )?;
    let curtail = table(
        "time,IAVL_DnWh,IAVL_ExtPwrDnWh\n\
         2014-01-01 00:00:00,100.0,0.0\n\
         2014-01-01 00:10:00,100.0,0.0\n",
    )?;
    let era5 = table(
        "time,WMETR_HorWdSpd,WMETR_HorWdDir,WMETR_EnvTmp\n\
         2014-01-01 00:00:00,6.2,180.0,283.0\n\
         2014-01-01 01:00:00,6.4,181.0,283.1\n",
    )?;
    let merra2 = table(
        "time,WMETR_HorWdSpd,WMETR_HorWdDir,WMETR_EnvTmp\n\
         2014-01-01 00:00:00,5.9,175.0,282.5\n\
         2014-01-01 01:00:00,6.1,176.0,282.6\n",
    )?;

    let inputs = RefineInputs {
        scada,
        curtail: Some(curtail),
        reanalysis: vec![("era5".to_string(), era5), ("merra2".to_string(), merra2)],
        ..Default::default()
    };
    let output = refine_all(&inputs, Paris, &RefineConfig::default());

    let json = serde_json::to_value(&output.reports)?;
    assert!(json["scada"]["datetime_converted"].as_bool().unwrap());
    assert!(json["meter"].is_null());
    assert_eq!(json["reanalysis"]["era5"]["product"], "era5");
    assert_eq!(json["reanalysis"]["merra2"]["product"], "merra2");
    assert_eq!(
        json["curtail"]["flag_availability_range_count"].as_u64(),
        Some(0)
    );

    // Flag columns are additive: no data column disappears.
    for col in ["time", "IAVL_DnWh", "IAVL_ExtPwrDnWh"] {
        assert!(output.tables.curtail.as_ref().unwrap().has_column(col));
    }
    Ok(())
}

#[test]
fn unconvertible_scada_does_not_block_other_datasets() -> Result<()> {
    let scada = table(
        "Date_time,Wind_turbine_name,P_avg,Ws_avg,Ot_avg\n\
         garbage,T1,100.0,7.1,10.0\n",
    )?;
    let meter = table(
        "time,MMTR_SupWh\n\
         2014-01-01 09:00:00,500.0\n\
         2014-01-01 09:10:00,510.0\n",
    )?;

    let inputs = RefineInputs {
        scada,
        meter: Some(meter),
        ..Default::default()
    };
    let output = refine_all(&inputs, Paris, &RefineConfig::default());

    let scada_report = &output.reports.scada;
    assert_eq!(
        scada_report.get("datetime_converted").unwrap(),
        &serde_json::Value::Bool(false)
    );
    assert!(scada_report.contains_key("datetime_error"));

    let meter_report = output.reports.meter.as_ref().unwrap();
    assert_eq!(
        meter_report.get("datetime_converted").unwrap(),
        &serde_json::Value::Bool(true)
    );
    Ok(())
}
