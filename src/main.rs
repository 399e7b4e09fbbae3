use anyhow::Context;
use aqicast::climatology::ClimatologyPredictor;
use aqicast::config::AppConfig;
use aqicast::runner::Runner;
use aqicast::server::{self, AppContext};
use aqicast::storage::open_store;
use aqicast::AqicastError;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "aqicast",
    version,
    about = "Daily AQI prediction from weather and air-quality history"
)]
struct Cli {
    /// TOML configuration file; `aqicast.toml` is used when present
    #[arg(short, long, env = "AQICAST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resample raw weather observations to daily statistics
    Resample,
    /// Combine the raw AQI files into one table
    Combine,
    /// Merge daily weather and combined AQI into the canonical dataset
    Merge,
    /// Derive the feature table from the canonical dataset
    Features,
    /// Train and save the model from the canonical dataset
    Train,
    /// Run every stage from the raw inputs
    Pipeline,
    /// Predict the AQI of one calendar date
    Predict {
        /// Date as YYYY-MM-DD
        #[arg(short, long)]
        date: String,
    },
    /// Serve predictions over HTTP
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let store = open_store(&config.storage)?;

    match cli.command {
        Command::Resample => {
            let daily = Runner::new(store, config).resample().await?;
            info!("Resampled {} days", daily.height());
        }
        Command::Combine => {
            let combined = Runner::new(store, config).combine().await?;
            info!("Combined {} AQI rows", combined.height());
        }
        Command::Merge => {
            let merged = Runner::new(store, config).merge().await?;
            info!("Merged {} rows", merged.height());
        }
        Command::Features => {
            let table = Runner::new(store, config).features().await?;
            info!("Derived {} feature rows", table.len());
        }
        Command::Train => {
            let report = Runner::new(store, config).train().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Pipeline => {
            let report = Runner::new(store, config).run_pipeline().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Predict { date } => {
            let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
                .map_err(|_| AqicastError::InvalidDate(date.clone()))?;
            let runner = Runner::new(store, config);
            let predictor = ClimatologyPredictor::new(
                Arc::new(runner.load_reference().await?),
                Arc::new(runner.load_model().await?),
            );
            let prediction = predictor.predict(date)?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let settings = config.server.clone();
            let ctx = AppContext::load(&Runner::new(store, config)).await;
            server::serve(ctx, &settings).await?;
        }
    }
    Ok(())
}
