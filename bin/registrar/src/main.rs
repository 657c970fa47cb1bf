mod settings;

use anyhow::{Context as _, Result};
use clap::{ArgAction, Parser, ValueEnum};
use registrar_consul::ConsulRegistry;
use registrar_core::{Context, Registrar, ServiceRegistry, WorkloadRuntime};
use registrar_docker::DockerClient;
use settings::Settings;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "registrar",
    version,
    about = "Registers published container ports with the local Consul agent"
)]
struct Cli {
    /// Configuration file (JSON, or YAML for .yaml/.yml)
    config: PathBuf,

    /// Log output format
    #[arg(long = "log-format", value_enum, env = "REGISTRAR_LOG_FORMAT", default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Run a single reconciliation sweep, print its report and exit
    #[arg(long = "once", action = ArgAction::SetTrue)]
    once: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let env = std::env::var("REGISTRAR_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let settings = match Settings::load(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };

    match run(&cli, settings).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, settings: Settings) -> Result<ExitCode> {
    info!("Starting registrar...");

    let docker = DockerClient::connect(&settings.docker_endpoint, settings.request_timeout)
        .context("Failed to configure Docker client")?;
    docker
        .ping()
        .await
        .with_context(|| format!("Docker daemon at {} is unreachable", settings.docker_endpoint))?;

    let consul = ConsulRegistry::new(&settings.consul_url, settings.request_timeout)
        .context("Failed to configure Consul client")?;
    consul
        .health_check_connectivity()
        .await
        .with_context(|| format!("Consul agent at {} is unreachable", settings.consul_url))?;

    info!(
        "Connected to Docker at {} and Consul at {}",
        settings.docker_endpoint, settings.consul_url
    );

    let ctx = Context::new(settings.registrar, Arc::new(docker), Arc::new(consul));
    let registrar = Registrar::new(ctx);

    if cli.once {
        let report = registrar.reconciler().reconcile().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(if report.is_clean() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, draining...");
        let _ = shutdown_tx.send(true);
    });

    registrar.run(shutdown_rx).await;
    info!("Registrar stopped");
    Ok(ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
