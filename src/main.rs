mod alias;
mod config;
mod database;
mod device;
mod extract;
mod geocode;
mod gps;
mod normalize;
mod similarity;
mod value;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use config::Config;
use database::{DeviceCategory, DeviceDatabase};
use device::DeviceIdentifier;
use extract::{Extractor, sources_from_json};
use geocode::create_geocoding_service;

#[derive(Parser)]
#[command(author, version, about = "Normalizes and enriches image metadata for forensic review")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize with a default config file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,

        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Extract a normalized metadata record from raw decoder tags
    Extract {
        /// JSON file with one tag mapping, or an array of mappings in
        /// precedence order (primary first)
        input: PathBuf,

        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Show device database status
    Status {
        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Search the device database
    Search {
        /// Free-text query matched against make and model
        query: String,

        /// Restrict to one category (camera, phone, lens)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        device_type: Option<String>,

        /// Path to config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Init { force, config } => {
            init_config(config, *force)?;
            Ok(())
        }
        Commands::Extract { input, config } => {
            let config_data = load_config(config)?;

            let contents = fs::read_to_string(input)
                .with_context(|| format!("Failed to read input from {}", input.display()))?;
            let json: serde_json::Value = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON from {}", input.display()))?;
            let sources = sources_from_json(json)?;

            let db = DeviceDatabase::load(&PathBuf::from(&config_data.database_file))?;
            let geocoder = create_geocoding_service(&config_data)?;
            let mut extractor = Extractor::new(DeviceIdentifier::new(db), geocoder);

            let record = extractor.extract(&sources);
            println!("{}", serde_json::to_string_pretty(&record)?);

            Ok(())
        }
        Commands::Status { config } => {
            let config_data = load_config(config)?;

            println!("metaprobe Status");
            println!("\nConfiguration:");
            println!("  Database file: {}", config_data.database_file);
            println!("  Geocoder: {:?}", config_data.geocoder);

            let db = DeviceDatabase::load(&PathBuf::from(&config_data.database_file))?;
            println!("\nDevice database:");
            for (category, count) in db.stats() {
                println!("  {}: {}", category, count);
            }

            Ok(())
        }
        Commands::Search {
            query,
            device_type,
            config,
        } => {
            let config_data = load_config(config)?;
            let db = DeviceDatabase::load(&PathBuf::from(&config_data.database_file))?;

            let category = match device_type.as_deref().map(str::to_lowercase).as_deref() {
                Some("camera") | Some("digital camera") => Some(DeviceCategory::Cameras),
                Some("smartphone") | Some("phone") | Some("mobile") => {
                    Some(DeviceCategory::Phones)
                }
                Some("lens") | Some("camera lens") => Some(DeviceCategory::Lenses),
                Some(other) => anyhow::bail!("Unknown device type: {}", other),
                None => None,
            };

            let results = db.search(query, category);
            if results.is_empty() {
                println!("No devices matched '{}'", query);
                return Ok(());
            }

            println!("Found {} device(s):", results.len());
            for result in results {
                let manufacturer = result
                    .get("Manufacturer")
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                let model = result
                    .get("FullModel")
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                let device_type = result
                    .get("DeviceType")
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                println!("  {} {} ({})", manufacturer, model, device_type);
            }

            Ok(())
        }
    }
}

fn init_config(config_path_opt: &Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = Config::get_config_path(config_path_opt);

    if config_path.exists() && !force {
        println!("Config file already exists at {}", config_path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    let config = Config::default();
    config
        .save_to_file(&config_path)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    println!("Created config file at {}", config_path.display());
    Ok(())
}

fn load_config(config_path_opt: &Option<PathBuf>) -> Result<Config> {
    let config_path = Config::get_config_path(config_path_opt);

    if !config_path.exists() {
        anyhow::bail!(
            "Config file not found at {}. Run 'metaprobe init' to create one.",
            config_path.display()
        );
    }

    Config::load_from_file(&config_path)
}
