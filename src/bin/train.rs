//! Train the Ames sale price model and save the artifact.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use amesboost::data::ames;
use amesboost::{io, AmesRegressor, FeatureEncoder, RegressorConfig, SchemaRegistry};

#[derive(Debug, Parser)]
#[command(about = "Train the Ames housing sale price regressor")]
struct Args {
    /// Directory holding the schema YAML sources.
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Directory for the cached dataset (downloaded if absent).
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Where to write the trained model artifact.
    #[arg(long, default_value = "model/ames_regressor.amsb")]
    model_path: PathBuf,

    /// Random seed for the train/validation split and subsampling.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let registry = SchemaRegistry::load(&args.config_dir)
        .with_context(|| format!("loading schema sources from {}", args.config_dir.display()))?;

    let data_path = ames::ensure_dataset(&args.data_dir).context("fetching dataset")?;
    let (table, targets) =
        ames::load_training_table(&data_path, &registry).context("loading dataset")?;

    let config = RegressorConfig::builder().seed(args.seed).build()?;
    let mut model = AmesRegressor::new(FeatureEncoder::from_registry(&registry), config);

    info!("training the model");
    model.fit(&table, &targets)?;

    io::save_model(&args.model_path, &model)
        .with_context(|| format!("saving model to {}", args.model_path.display()))?;
    info!(path = %args.model_path.display(), "model saved");

    Ok(())
}
