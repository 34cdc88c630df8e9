//! Pipeline orchestrator: runs every applicable dataset refiner over one
//! upload batch and aggregates cleaned tables plus QA reports.

use std::collections::BTreeMap;

use chrono_tz::Tz;
use serde::Serialize;
use tracing::info;

use crate::refine::config::RefineConfig;
use crate::refine::refiners::{
    refine_asset, refine_curtail, refine_meter, refine_reanalysis, refine_scada,
};
use crate::refine::report::QaReport;
use crate::table::Table;

/// Raw tables for one upload batch. SCADA is required; everything else is
/// optional. Reanalysis products are processed in the order given.
#[derive(Debug, Default)]
pub struct RefineInputs {
    pub scada: Table,
    pub meter: Option<Table>,
    pub curtail: Option<Table>,
    pub asset: Option<Table>,
    pub reanalysis: Vec<(String, Table)>,
}

/// Cleaned tables, keyed like the inputs. Absent optional inputs stay `None`.
#[derive(Debug, Clone)]
pub struct RefinedTables {
    pub scada: Table,
    pub meter: Option<Table>,
    pub curtail: Option<Table>,
    pub asset: Option<Table>,
    pub reanalysis: BTreeMap<String, Table>,
}

/// QA reports mirroring the structure of [`RefinedTables`].
#[derive(Debug, Clone, Serialize)]
pub struct QaReports {
    pub scada: QaReport,
    pub meter: Option<QaReport>,
    pub curtail: Option<QaReport>,
    pub asset: Option<QaReport>,
    pub reanalysis: BTreeMap<String, QaReport>,
}

/// Top-level refinement result: cleaned tables plus per-dataset QA reports.
#[derive(Debug, Clone)]
pub struct RefineOutput {
    pub tables: RefinedTables,
    pub reports: QaReports,
}

/// Run the matching refiner over each present dataset.
///
/// Partial success is the default outcome: a dataset whose checks fail still
/// produces a report describing the failures, and the remaining datasets are
/// refined normally.
pub fn refine_all(inputs: &RefineInputs, local_tz: Tz, cfg: &RefineConfig) -> RefineOutput {
    info!("refining scada");
    let (scada, scada_report) = refine_scada(&inputs.scada, local_tz, &cfg.scada);

    let (meter, meter_report) = match &inputs.meter {
        Some(table) => {
            info!("refining meter");
            let (df, report) = refine_meter(table, local_tz, &cfg.meter);
            (Some(df), Some(report))
        }
        None => (None, None),
    };

    let (curtail, curtail_report) = match &inputs.curtail {
        Some(table) => {
            info!("refining curtailment");
            let (df, report) = refine_curtail(table, local_tz, &cfg.curtail);
            (Some(df), Some(report))
        }
        None => (None, None),
    };

    let (asset, asset_report) = match &inputs.asset {
        Some(table) => {
            info!("refining asset");
            let (df, report) = refine_asset(table, &cfg.asset);
            (Some(df), Some(report))
        }
        None => (None, None),
    };

    let mut reanalysis_tables = BTreeMap::new();
    let mut reanalysis_reports = BTreeMap::new();
    for (product, table) in &inputs.reanalysis {
        info!(product, "refining reanalysis");
        let (df, report) = refine_reanalysis(table, product, local_tz, &cfg.reanalysis);
        reanalysis_tables.insert(product.clone(), df);
        reanalysis_reports.insert(product.clone(), report);
    }

    RefineOutput {
        tables: RefinedTables {
            scada,
            meter,
            curtail,
            asset,
            reanalysis: reanalysis_tables,
        },
        reports: QaReports {
            scada: scada_report,
            meter: meter_report,
            curtail: curtail_report,
            asset: asset_report,
            reanalysis: reanalysis_reports,
        },
    }
}
