use super::ledger::{AggregateSummary, MAX_WORKERS, ProductionLedger};
use factory_core::{Error, Message, OrderConfirmation, Result, Transport, WorkOrder};
use std::net::SocketAddr;
use std::time::Instant;

/// The procurement side of one exchange with a factory server.
///
/// A run sends a single order, waits for the confirmation that fixes the
/// worker count, then tallies reports until every confirmed worker has
/// completed. There are no timeouts: a lost completion leaves the run
/// waiting.
pub struct Coordinator<T: Transport> {
    transport: T,
    server: SocketAddr,
}

impl<T: Transport> Coordinator<T> {
    pub const fn new(transport: T, server: SocketAddr) -> Self {
        Self { transport, server }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Places `order` and returns the summary once all workers completed.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if sending or receiving fails.
    /// - [`Error::ProtocolFault`] on a `PROTOCOL_ERROR`, or on any message
    ///   that does not belong to the current phase. No partial summary is
    ///   returned.
    #[tracing::instrument(skip(self), fields(server = %self.server, units = order.total_units))]
    pub async fn run(&self, order: WorkOrder) -> Result<AggregateSummary> {
        let start = Instant::now();

        let request = Message::Request(order);
        self.transport.send_to(&request, self.server).await?;
        tracing::info!("Attempting factory server at {}", self.server);
        tracing::info!("PROCUREMENT Sent this message to the FACTORY server: {request}");

        tracing::info!("PROCUREMENT is now waiting for order confirmation ...");
        let OrderConfirmation { worker_count } = self.await_confirmation().await?;

        let mut ledger = ProductionLedger::new(order.total_units, worker_count);
        while !ledger.is_finished() {
            let (message, from) = self.transport.recv_from().await?;
            match message {
                Message::Production(report) => match ledger.record_production(&report) {
                    Ok(_) => tracing::info!(
                        "PROCUREMENT: Factory {:>4} produced {:>5} parts in {:>5} milliSecs",
                        report.worker_id,
                        report.units_made,
                        report.duration_ms
                    ),
                    Err(inconsistency) => tracing::warn!("Ignoring {message}: {inconsistency}"),
                },
                Message::Completion(report) => match ledger.record_completion(&report) {
                    Ok(active) => tracing::info!(
                        "PROCUREMENT: Factory {} COMPLETED its task, {active} still active",
                        report.worker_id
                    ),
                    Err(inconsistency) => tracing::warn!("Ignoring {message}: {inconsistency}"),
                },
                Message::ProtocolError => {
                    return Err(fault(format!(
                        "PROTOCOL_ERROR from {from} with {} factories still active",
                        ledger.active()
                    )));
                }
                other => {
                    return Err(fault(format!(
                        "unexpected {other} from {from} while collecting reports"
                    )));
                }
            }
        }

        Ok(ledger.finish(start.elapsed()))
    }

    async fn await_confirmation(&self) -> Result<OrderConfirmation> {
        let (message, from) = self.transport.recv_from().await?;
        tracing::info!("PROCUREMENT received this from the FACTORY server: {message}");

        match message {
            Message::OrderConfirm(confirmation) if confirmation.worker_count > MAX_WORKERS => {
                Err(fault(format!(
                    "confirmation announces {} factories, more than {MAX_WORKERS}",
                    confirmation.worker_count
                )))
            }
            Message::OrderConfirm(confirmation) => Ok(confirmation),
            other => Err(fault(format!(
                "expected ORDER_CONFIRM from {from}, received {other}"
            ))),
        }
    }
}

fn fault(reason: String) -> Error {
    tracing::error!("PROCUREMENT: {reason}");
    Error::ProtocolFault { reason }
}
