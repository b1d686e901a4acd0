//! Serve sale price predictions over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use amesboost::server::{router, AppState};
use amesboost::{io, SchemaRegistry};

#[derive(Debug, Parser)]
#[command(about = "Serve Ames housing sale price predictions")]
struct Args {
    /// Address to bind.
    #[arg(short, long, default_value = "127.0.0.1")]
    address: String,

    /// Port to bind.
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Trained model artifact.
    #[arg(long, default_value = "model/ames_regressor.amsb")]
    model_path: PathBuf,

    /// Directory holding the schema YAML sources.
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    if !args.model_path.is_file() {
        bail!(
            "model artifact {} not found; train one with the `train` binary",
            args.model_path.display()
        );
    }

    let model = io::load_model(&args.model_path)
        .with_context(|| format!("loading model from {}", args.model_path.display()))?;
    let registry = SchemaRegistry::load(&args.config_dir)
        .with_context(|| format!("loading schema sources from {}", args.config_dir.display()))?;

    let state = AppState::new(Arc::new(model), &registry);
    let app = router(state);

    let addr = format!("{}:{}", args.address, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "server running");

    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
