use anyhow::bail;
use clap::Parser;
use factory_core::{UdpTransport, WorkOrder};
use procurement::client::config::{CliArgs, ProcurementConfig};
use procurement::client::coordinator::Coordinator;
use procurement::client::telemetry::init_logging;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ProcurementConfig::try_from(args)?;

    init_logging()?;
    tracing::info!("PROCUREMENT: Started");

    let transport = UdpTransport::bind(config.bind_addr).await?;
    let coordinator = Coordinator::new(transport, config.server_addr);
    let order = WorkOrder {
        total_units: config.order_size,
    };

    let summary = tokio::select! {
        summary = coordinator.run(order) => summary?,
        () = ctrl_c() => bail!("Interrupted before the order completed"),
    };

    for line in summary.to_string().lines() {
        tracing::info!("{line}");
    }
    if !summary.is_fulfilled() {
        tracing::warn!(
            "Order of {} units was not fulfilled: {} made",
            summary.order_size,
            summary.total_units
        );
    }

    tracing::info!(">>> PROCUREMENT Terminated");
    Ok(())
}

async fn ctrl_c() {
    signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}
