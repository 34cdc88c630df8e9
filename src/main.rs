use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use windplant_qa::config::Config;
use windplant_qa::error::{ApiError, Result};
use windplant_qa::logging;
use windplant_qa::refine::{refine_all, RefineConfig, RefineInputs};
use windplant_qa::server::start_server;
use windplant_qa::session::{InMemorySessionStore, SessionStore};
use windplant_qa::table::Table;

#[derive(Parser)]
#[command(name = "windplant_qa")]
#[command(about = "Wind plant dataset QA service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        /// Port to listen on (overrides config.toml)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the QA pipeline over local CSV files and print the QA report
    Refine {
        /// SCADA CSV (required)
        #[arg(long)]
        scada: PathBuf,
        /// Meter CSV
        #[arg(long)]
        meter: Option<PathBuf>,
        /// Curtailment CSV
        #[arg(long)]
        curtail: Option<PathBuf>,
        /// Asset CSV
        #[arg(long)]
        asset: Option<PathBuf>,
        /// ERA5 reanalysis CSV
        #[arg(long)]
        era5: Option<PathBuf>,
        /// MERRA-2 reanalysis CSV
        #[arg(long)]
        merra2: Option<PathBuf>,
        /// Local timezone of the plant (IANA zone name)
        #[arg(long, default_value = "UTC")]
        local_tz: String,
        /// Write cleaned tables as CSVs into this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

fn load_table(path: &PathBuf) -> Result<Table> {
    let table = Table::from_csv_path(path)?;
    if table.is_empty() {
        return Err(ApiError::EmptyDataset {
            dataset: path.display().to_string(),
        });
    }
    Ok(table)
}

fn load_optional(path: &Option<PathBuf>) -> Result<Option<Table>> {
    match path {
        Some(path) => Ok(Some(load_table(path)?)),
        None => Ok(None),
    }
}

fn run_refine_command(
    scada: PathBuf,
    meter: Option<PathBuf>,
    curtail: Option<PathBuf>,
    asset: Option<PathBuf>,
    era5: Option<PathBuf>,
    merra2: Option<PathBuf>,
    local_tz: String,
    out_dir: Option<PathBuf>,
) -> Result<()> {
    let tz: chrono_tz::Tz = local_tz
        .parse()
        .map_err(|_| ApiError::UnknownTimezone(local_tz.clone()))?;

    let mut reanalysis = Vec::new();
    if let Some(path) = &era5 {
        reanalysis.push(("era5".to_string(), load_table(path)?));
    }
    if let Some(path) = &merra2 {
        reanalysis.push(("merra2".to_string(), load_table(path)?));
    }

    let inputs = RefineInputs {
        scada: load_table(&scada)?,
        meter: load_optional(&meter)?,
        curtail: load_optional(&curtail)?,
        asset: load_optional(&asset)?,
        reanalysis,
    };

    let output = refine_all(&inputs, tz, &RefineConfig::default());

    if let Some(dir) = out_dir {
        std::fs::create_dir_all(&dir)?;
        let mut writes: Vec<(String, &Table)> = vec![("scada".to_string(), &output.tables.scada)];
        if let Some(table) = &output.tables.meter {
            writes.push(("meter".to_string(), table));
        }
        if let Some(table) = &output.tables.curtail {
            writes.push(("curtail".to_string(), table));
        }
        if let Some(table) = &output.tables.asset {
            writes.push(("asset".to_string(), table));
        }
        for (name, table) in &output.tables.reanalysis {
            writes.push((format!("reanalysis_{name}"), table));
        }
        for (name, table) in writes {
            let path = dir.join(format!("{name}.csv"));
            let file = std::fs::File::create(&path)?;
            table.write_csv(file)?;
            info!(path = %path.display(), "wrote cleaned table");
        }
    }

    let report = serde_json::to_value(&output.reports)
        .map_err(|e| ApiError::Config(format!("failed to serialize QA report: {e}")))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "qa_report": report }))
            .unwrap_or_default()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let config = Config::load()?;
            let port = port.unwrap_or(config.server.port);
            let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
            start_server(store, &config.server.bind, port).await?;
        }
        Commands::Refine {
            scada,
            meter,
            curtail,
            asset,
            era5,
            merra2,
            local_tz,
            out_dir,
        } => {
            run_refine_command(
                scada, meter, curtail, asset, era5, merra2, local_tz, out_dir,
            )?;
        }
    }
    Ok(())
}
