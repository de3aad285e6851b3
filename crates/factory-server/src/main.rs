use clap::Parser;
use factory_core::UdpTransport;
use factory_server::server::config::{CliArgs, ServerConfig};
use factory_server::server::service::handler::FactoryService;
use factory_server::server::telemetry::init_telemetry;
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let transport = UdpTransport::bind(config.bind_addr).await?;
    log_startup_info(&config);

    let shutdown_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown_token.clone()));

    let mut service = FactoryService::new(config, transport, shutdown_token);
    let result = service.serve().await;

    match &result {
        Ok(()) => tracing::info!(
            "Service shut down successfully after {} orders",
            service.orders_served()
        ),
        Err(e) => tracing::error!("Service stopped: {e}"),
    }

    providers.shutdown();
    Ok(result?)
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting FACTORY server on {} with full config: {:#?}",
            config.bind_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting FACTORY server on {} with {} workers",
            config.bind_addr,
            config.num_workers
        );
    }
}

async fn shutdown_signal(shutdown_token: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    shutdown_token.cancel();
}
