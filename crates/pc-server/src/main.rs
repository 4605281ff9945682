use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pc_server::bootstrap::{self, RuntimeConfig};
use pc_server::config::AppConfig;
use pc_server::handler::{router, AppState};
use pc_server::telemetry;

#[derive(Parser)]
#[command(name = "pc", about = "DPO preference pair curation server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Start the annotation web UI (default).
    Serve,
    /// Validate configuration file and exit.
    Validate,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Command::Validate) => run_validate(&cli.config),
        Some(Command::Serve) | None => run_serve(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_runtime(path: &Path) -> anyhow::Result<RuntimeConfig> {
    let config = AppConfig::from_file(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    bootstrap::into_runtime(config).context("config invalid")
}

fn run_validate(path: &Path) -> anyhow::Result<()> {
    load_runtime(path)?;
    println!("Config valid: {}", path.display());
    Ok(())
}

fn run_serve(path: &Path) -> anyhow::Result<()> {
    let runtime = load_runtime(path)?;
    telemetry::init_tracing(&runtime.log_level, runtime.log_format);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?
        .block_on(serve(runtime))
}

async fn serve(runtime: RuntimeConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_runtime(&runtime)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&runtime.listen_addr)
        .await
        .with_context(|| format!("binding {}", runtime.listen_addr))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        model = %runtime.backend.model,
        endpoint = %runtime.backend.endpoint,
        output_file = %runtime.output_file.display(),
        session_file = %runtime.session_file.display(),
        "annotation server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
