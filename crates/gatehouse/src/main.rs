use anyhow::Context;
use clap::{Parser, ValueEnum};
use gatehouse::{Config, Service, ServiceState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "gatehouse", version, about = "API gateway with credential injection")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "GATEHOUSE_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gatehouse=info,info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_format);

    let config = Config::from_file(&args.config)?;
    info!("Loaded {} endpoint(s) from {}", config.endpoints.len(), args.config.display());

    let mut service = Service::new(&config).context("Failed to configure outbound client")?;
    // Longest local path first
    for (name, endpoint) in config.endpoints_by_specificity() {
        service
            .register_endpoint(endpoint)
            .with_context(|| format!("Failed to register endpoint '{name}'"))?;
    }

    let service = Arc::new(service);
    let serving = Arc::clone(&service);
    let mut server = tokio::spawn(async move { serving.start().await });

    tokio::select! {
        result = &mut server => {
            // The listener only returns early on a startup failure
            return result
                .context("Gateway task panicked")?
                .context("Gateway failed");
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        }
    }

    if service.state() != ServiceState::Running {
        server.abort();
        return Ok(());
    }
    service.stop().await?;
    server.await.context("Gateway task panicked")??;
    Ok(())
}
