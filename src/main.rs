//! Body measurement CLI
//!
//! Trains and applies the measurement regressors and the weight-change network.

use clap::{Parser, Subcommand};
use bodyshape::{Config, Result};

#[derive(Parser)]
#[command(name = "bodyshape")]
#[command(about = "Body measurement prediction from height and weight", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "bodyshape.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Train boosted trees and ridge models on the split folders
    TrainRegression,
    /// Train the weight-change network on the merged dataset
    TrainNetwork {
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
    },
    /// Predict measurements from height and weight
    Predict {
        /// Height in cm
        #[arg(long)]
        height: f64,
        /// Weight in kg
        #[arg(long)]
        weight: f64,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Project a subject's measurements to a new weight
    Project {
        /// Merged CSV holding the subject
        #[arg(long)]
        measurements: String,
        /// Subject id (defaults to the first complete row)
        #[arg(long)]
        subject: Option<String>,
        /// Target weight in kg
        #[arg(long)]
        new_weight: f64,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Join metadata and measurements of every split into one CSV
    Merge {
        /// Output path (defaults to data.merged_path)
        #[arg(long)]
        output: Option<String>,
    },
    /// Show dataset status
    Status,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show which trained artifacts exist
    Info,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Merge { output } => commands::data_merge(&config, output),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::TrainRegression => commands::train_regression(&config),
        Commands::TrainNetwork { epochs } => commands::train_network(&config, epochs),
        Commands::Predict {
            height,
            weight,
            format,
        } => commands::predict(&config, height, weight, format),
        Commands::Project {
            measurements,
            subject,
            new_weight,
            format,
        } => commands::project(&config, &measurements, subject, new_weight, format),
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
        },
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use bodyshape::data::{load_merged, load_splits, write_merged, DatasetSummary};
    use bodyshape::BodyError;
    use std::path::Path;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        println!("\nNext steps:");
        println!("  1. Edit {} to point data.root at the split folders", config_path);
        println!("  2. Run 'bodyshape data merge' to build the merged CSV");
        println!("  3. Run 'bodyshape train-regression' and 'bodyshape train-network'");
        println!("  4. Run 'bodyshape predict --height 180 --weight 80'");

        Ok(())
    }

    pub fn data_merge(config: &Config, output: Option<String>) -> Result<()> {
        let records = load_splits(&config.data.root, &config.data.splits)?;
        let output = output.unwrap_or_else(|| config.data.merged_path.clone());

        write_merged(&output, &records)?;
        println!("Merged {} subjects into {}", records.len(), output);

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let records = load_splits(&config.data.root, &config.data.splits)?;
        let summary = DatasetSummary::from_records(&records);

        println!("Dataset Status");
        println!("───────────────────────────────");
        println!("  Root:          {}", config.data.root);
        println!("  Splits:        {}", config.data.splits.join(", "));
        println!("  Subjects:      {}", summary.total);
        println!("  Male:          {}", summary.male);
        println!("  Female:        {}", summary.female);
        if summary.other > 0 {
            println!("  Other:         {}", summary.other);
        }
        println!("  Complete male: {}", summary.complete_male);
        let merged = if Path::new(&config.data.merged_path).exists() {
            "present"
        } else {
            "missing"
        };
        println!("  Merged CSV:    {} ({})", config.data.merged_path, merged);

        Ok(())
    }

    pub fn train_regression(config: &Config) -> Result<()> {
        use bodyshape::features::RegressionTable;
        use bodyshape::training::RegressionTrainer;

        println!("Loading splits from {}...", config.data.root);
        let records = load_splits(&config.data.root, &config.data.splits)?;
        let table = RegressionTable::from_records(&records)?;
        println!(
            "  {} complete male rows (weight mean {:.2} kg)",
            table.len(),
            table.centering.mean
        );

        let trainer = RegressionTrainer::new(config.regression.clone());
        let (models, report) = trainer.train(&table)?;
        models.save(&config.data.output_dir)?;

        println!();
        for score in &report.scores {
            println!(
                "  {:<6} {:<14} MAE {:>6.2} cm  R² {:>5.2}",
                score.target, score.model, score.mae, score.r2
            );
        }
        println!("\n{}", report);
        println!("\nModels saved to {}", config.data.output_dir);

        Ok(())
    }

    pub fn train_network(config: &Config, epochs: Option<usize>) -> Result<()> {
        use burn::backend::{Autodiff, NdArray};
        use bodyshape::data::ChangeDataset;
        use bodyshape::features::{ChangeTable, StandardScaler, WeightPerturbation};
        use bodyshape::model::{ChangeNetwork, ChangeNetworkConfig};
        use bodyshape::training::network_trainer::{
            CHECKPOINT_NAME, INPUT_SCALER_FILE, OUTPUT_SCALER_FILE,
        };
        use bodyshape::training::NetworkTrainer;

        type MyBackend = NdArray<f32>;
        type MyAutodiffBackend = Autodiff<MyBackend>;

        let mut network_config = config.network.clone();
        if let Some(e) = epochs {
            network_config.epochs = e;
        }

        if !Path::new(&config.data.merged_path).exists() {
            return Err(BodyError::Config(format!(
                "{} not found. Run 'bodyshape data merge' first.",
                config.data.merged_path
            )));
        }

        println!("Loading {}...", config.data.merged_path);
        let records = load_merged(&config.data.merged_path)?;
        let table = ChangeTable::from_records(&records, WeightPerturbation::default(), network_config.seed)?;

        let input_scaler = StandardScaler::fit(&table.inputs)?;
        let output_scaler = StandardScaler::fit(&table.targets)?;
        std::fs::create_dir_all(&config.data.output_dir)?;
        input_scaler.save(config.output_path(INPUT_SCALER_FILE))?;
        output_scaler.save(config.output_path(OUTPUT_SCALER_FILE))?;

        let dataset = ChangeDataset::from_rows(
            &input_scaler.transform(&table.inputs),
            &output_scaler.transform(&table.targets),
        );
        let (train_dataset, val_dataset) =
            dataset.random_split(network_config.train_ratio, network_config.seed);
        println!(
            "  {} training samples, {} validation samples",
            train_dataset.len(),
            val_dataset.len()
        );

        let device = burn::backend::ndarray::NdArrayDevice::default();
        let model_config = ChangeNetworkConfig::default().with_dropout(network_config.dropout);
        let model = ChangeNetwork::<MyAutodiffBackend>::new(&device, &model_config);

        let checkpoint = config.output_path(CHECKPOINT_NAME);
        let trainer = NetworkTrainer::new(model, network_config, device).with_checkpoint(checkpoint.clone());

        println!("\nStarting training...\n");
        let (_, history) = trainer.train(train_dataset, val_dataset)?;

        println!(
            "\nTraining complete. Best model saved with validation loss: {:.6}.",
            history.best_val_loss
        );
        println!("  Best epoch: {}", history.best_epoch + 1);
        println!("  Checkpoint: {}.mpk", checkpoint.display());

        Ok(())
    }

    pub fn predict(config: &Config, height: f64, weight: f64, format: OutputFormat) -> Result<()> {
        use bodyshape::predict::MeasurementPredictor;

        let predictor = MeasurementPredictor::load(&config.data.output_dir)?;
        let predictions = predictor.predict(height, weight)?;

        match format {
            OutputFormat::Table => {
                println!("Predicted measurements ({:.1} cm, {:.1} kg)", height, weight);
                println!("───────────────────────────────");
                for p in &predictions {
                    println!("  {:<6} {:>7.2} cm", p.measurement, p.value_cm);
                }
            }
            OutputFormat::Json => {
                let values: serde_json::Map<String, serde_json::Value> = predictions
                    .iter()
                    .map(|p| (p.measurement.column().to_string(), p.value_cm.into()))
                    .collect();
                let json = serde_json::json!({
                    "height_cm": height,
                    "weight_kg": weight,
                    "measurements": values,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            OutputFormat::Csv => {
                println!("measurement,value_cm");
                for p in &predictions {
                    println!("{},{:.3}", p.measurement, p.value_cm);
                }
            }
        }

        Ok(())
    }

    pub fn project(
        config: &Config,
        measurements: &str,
        subject: Option<String>,
        new_weight: f64,
        format: OutputFormat,
    ) -> Result<()> {
        use burn::backend::NdArray;
        use bodyshape::predict::ChangeProjector;

        type MyBackend = NdArray<f32>;

        let records = load_merged(measurements)?;
        let record = match &subject {
            Some(id) => records
                .iter()
                .find(|r| &r.subject_id == id)
                .ok_or_else(|| BodyError::Parse(format!("subject '{}' not in {}", id, measurements)))?,
            None => records.iter().find(|r| r.is_complete()).ok_or_else(|| {
                BodyError::EmptyDataset(format!("no complete subject in {}", measurements))
            })?,
        };

        let device = burn::backend::ndarray::NdArrayDevice::default();
        let projector = ChangeProjector::<MyBackend>::load(&config.data.output_dir, device)?;
        let projections = projector.project(record, new_weight)?;

        match format {
            OutputFormat::Table => {
                println!(
                    "Subject {}: {:.1} kg -> {:.1} kg",
                    record.subject_id,
                    record.weight_kg.unwrap_or_default(),
                    new_weight
                );
                println!("──────────────────────────────────────────────────");
                println!("  {:<20} {:>9} {:>9} {:>8}", "measurement", "current", "projected", "change");
                for p in &projections {
                    println!(
                        "  {:<20} {:>9.2} {:>9.2} {:>7.2}%",
                        p.measurement,
                        p.current_cm,
                        p.projected_cm,
                        p.relative_change * 100.0
                    );
                }
            }
            OutputFormat::Json => {
                let rows: Vec<serde_json::Value> = projections
                    .iter()
                    .map(|p| {
                        serde_json::json!({
                            "measurement": p.measurement.column(),
                            "current_cm": p.current_cm,
                            "projected_cm": p.projected_cm,
                            "relative_change": p.relative_change,
                        })
                    })
                    .collect();
                let json = serde_json::json!({
                    "subject_id": record.subject_id,
                    "weight_kg": record.weight_kg,
                    "new_weight": new_weight,
                    "projections": rows,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            OutputFormat::Csv => {
                println!("measurement,current_cm,projected_cm,relative_change");
                for p in &projections {
                    println!(
                        "{},{:.3},{:.3},{:.6}",
                        p.measurement, p.current_cm, p.projected_cm, p.relative_change
                    );
                }
            }
        }

        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        use bodyshape::training::network_trainer::{
            CHECKPOINT_NAME, INPUT_SCALER_FILE, OUTPUT_SCALER_FILE,
        };
        use bodyshape::training::regression::{
            CENTERING_FILE, FEATURES_FILE, RIDGE_MODELS_FILE, TARGETS_FILE, TREE_MODELS_FILE,
        };

        let checkpoint = format!("{}.mpk", CHECKPOINT_NAME);
        let artifacts = [
            TREE_MODELS_FILE,
            RIDGE_MODELS_FILE,
            FEATURES_FILE,
            TARGETS_FILE,
            CENTERING_FILE,
            INPUT_SCALER_FILE,
            OUTPUT_SCALER_FILE,
            checkpoint.as_str(),
        ];

        println!("Model Artifacts ({})", config.data.output_dir);
        println!("───────────────────────────────");
        for name in artifacts {
            let status = if config.output_path(name).exists() {
                "ok"
            } else {
                "missing"
            };
            println!("  {:<22} {}", name, status);
        }

        Ok(())
    }
}
