//! Per-dataset refinement configuration.
//!
//! Column names, physical bounds, sampling frequencies, and the unresponsive
//! sensor threshold are enumerated here once; callers override individual
//! fields (e.g. from upload form fields) instead of threading long parameter
//! lists through the pipeline.

/// Inclusive lower/upper bound pair for a physically plausible value range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

#[derive(Debug, Clone)]
pub struct ScadaConfig {
    pub time_col: String,
    pub id_col: String,
    pub power_col: String,
    pub windspeed_col: String,
    pub temp_col: String,
    pub freq: String,
    pub power_range: Bounds,
    pub windspeed_range: Bounds,
    pub temp_range: Bounds,
    pub unresponsive_threshold: usize,
}

impl Default for ScadaConfig {
    fn default() -> Self {
        Self {
            time_col: "Date_time".to_string(),
            id_col: "Wind_turbine_name".to_string(),
            power_col: "P_avg".to_string(),
            windspeed_col: "Ws_avg".to_string(),
            temp_col: "Ot_avg".to_string(),
            freq: "10min".to_string(),
            power_range: Bounds::new(-20.0, 2200.0),
            windspeed_range: Bounds::new(0.0, 50.0),
            temp_range: Bounds::new(-40.0, 50.0),
            unresponsive_threshold: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeterConfig {
    pub time_col: String,
    pub energy_col: String,
    pub freq: String,
    pub energy_range: Bounds,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            time_col: "time".to_string(),
            energy_col: "MMTR_SupWh".to_string(),
            freq: "10min".to_string(),
            energy_range: Bounds::new(-100.0, 1e7),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CurtailConfig {
    pub time_col: String,
    pub avail_col: String,
    pub curtail_col: String,
    pub freq: String,
    pub avail_range: Bounds,
    pub curtail_range: Bounds,
}

impl Default for CurtailConfig {
    fn default() -> Self {
        Self {
            time_col: "time".to_string(),
            avail_col: "IAVL_DnWh".to_string(),
            curtail_col: "IAVL_ExtPwrDnWh".to_string(),
            freq: "10min".to_string(),
            avail_range: Bounds::new(0.0, 1e7),
            curtail_range: Bounds::new(0.0, 1e7),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssetConfig {
    pub id_col: String,
    pub latitude_col: String,
    pub longitude_col: String,
    pub rated_power_col: String,
    pub latitude_range: Bounds,
    pub longitude_range: Bounds,
    pub rated_power_range: Bounds,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            id_col: "asset_id".to_string(),
            latitude_col: "latitude".to_string(),
            longitude_col: "longitude".to_string(),
            rated_power_col: "rated_power".to_string(),
            latitude_range: Bounds::new(-90.0, 90.0),
            longitude_range: Bounds::new(-180.0, 180.0),
            rated_power_range: Bounds::new(0.0, 1e7),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReanalysisConfig {
    pub time_col: String,
    pub windspeed_col: String,
    pub winddir_col: String,
    pub temp_col: String,
    pub freq: String,
    pub windspeed_range: Bounds,
    pub winddir_range: Bounds,
    /// Reanalysis products report ambient temperature in Kelvin.
    pub temp_range: Bounds,
    pub unresponsive_threshold: usize,
}

impl Default for ReanalysisConfig {
    fn default() -> Self {
        Self {
            time_col: "time".to_string(),
            windspeed_col: "WMETR_HorWdSpd".to_string(),
            winddir_col: "WMETR_HorWdDir".to_string(),
            temp_col: "WMETR_EnvTmp".to_string(),
            freq: "1h".to_string(),
            windspeed_range: Bounds::new(0.0, 80.0),
            winddir_range: Bounds::new(0.0, 360.0),
            temp_range: Bounds::new(200.0, 340.0),
            unresponsive_threshold: 3,
        }
    }
}

/// Bundled configuration for one refinement run.
#[derive(Debug, Clone, Default)]
pub struct RefineConfig {
    pub scada: ScadaConfig,
    pub meter: MeterConfig,
    pub curtail: CurtailConfig,
    pub asset: AssetConfig,
    pub reanalysis: ReanalysisConfig,
}
