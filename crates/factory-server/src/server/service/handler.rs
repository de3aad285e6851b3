//! Datagram service implementation for the factory.
//!
//! This module defines [`FactoryService`], which owns the server's transport
//! endpoint and its [`WorkPool`], and serves orders one at a time.
//!
//! ## Responsibilities
//!
//! - Wait for a `REQUEST`, reset the pool and confirm the worker count.
//! - Spawn a [`Crew`] of workers and relay every report they emit to the
//!   requesting client via [`relay_reports`].
//! - Answer stray or oversized requests with `PROTOCOL_ERROR`.
//! - On shutdown, notify the current counterpart with `PROTOCOL_ERROR` and
//!   stop.

use crate::server::{
    config::ServerConfig,
    pool::{manager::Crew, profiles::ProfileSource, worker::WorkerOutcome},
    service::relay::relay_reports,
    telemetry::{increment_orders_accepted, increment_protocol_faults, record_order_duration},
};
use core::time::Duration;
use factory_core::{Error, Message, OrderConfirmation, Result, Transport, WorkOrder, WorkPool};
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What one served order produced, as seen from the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderSummary {
    pub coordinator: SocketAddr,
    pub order: WorkOrder,
    pub outcomes: Vec<WorkerOutcome>,
    pub reports_relayed: u64,
    pub elapsed: Duration,
}

impl OrderSummary {
    pub fn units_made(&self) -> u64 {
        self.outcomes.iter().map(|o| o.units_made).sum()
    }
}

/// The factory server.
///
/// Orders are served strictly one at a time: while an order is running the
/// service does not read from its endpoint, so later requests wait in the
/// socket buffer.
pub struct FactoryService<T: Transport> {
    config: ServerConfig,
    transport: T,
    pool: Arc<WorkPool>,
    profiles: ProfileSource,
    shutdown_token: CancellationToken,
    counterpart: Option<SocketAddr>,
    orders_served: u64,
}

impl<T: Transport> FactoryService<T> {
    /// Creates a service that reads from `transport` until `shutdown_token`
    /// is cancelled.
    pub fn new(config: ServerConfig, transport: T, shutdown_token: CancellationToken) -> Self {
        let profiles = ProfileSource::from_config(&config);
        Self {
            config,
            transport,
            pool: Arc::new(WorkPool::new()),
            profiles,
            shutdown_token,
            counterpart: None,
            orders_served: 0,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub const fn orders_served(&self) -> u64 {
        self.orders_served
    }

    /// Serves orders until shutdown or a fatal error.
    ///
    /// Returns `Ok(())` after a requested shutdown. Transport failures and a
    /// poisoned pool are returned as errors and end the service.
    pub async fn serve(&mut self) -> Result<()> {
        loop {
            tracing::info!("FACTORY server waiting for Order Requests");

            let received = tokio::select! {
                () = self.shutdown_token.cancelled() => None,
                received = self.transport.recv_from() => Some(received?),
            };
            let Some((message, from)) = received else {
                self.notify_shutdown().await;
                return Ok(());
            };

            tracing::info!("FACTORY server received {message} from {from}");
            self.counterpart = Some(from);

            match message {
                Message::Request(order) if order.total_units > self.config.max_order_units => {
                    self.reject(
                        from,
                        &format!(
                            "order of {} units exceeds the limit of {}",
                            order.total_units, self.config.max_order_units
                        ),
                    )
                    .await?;
                }
                Message::Request(order) => match self.fulfil(order, from).await {
                    Ok(summary) => {
                        self.orders_served += 1;
                        log_summary(&summary);
                    }
                    Err(Error::ServiceShutdown) => {
                        self.notify_shutdown().await;
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::error!("Order from {from} failed: {e}");
                        return Err(e);
                    }
                },
                other => {
                    self.reject(from, &format!("expected REQUEST, received {other}"))
                        .await?;
                }
            }
        }
    }

    /// Runs a single order to completion.
    ///
    /// # Errors
    ///
    /// - [`Error::ServiceShutdown`] if shutdown was requested mid-order.
    /// - Any transport error while confirming or relaying; the order's
    ///   workers are aborted.
    #[tracing::instrument(skip(self), fields(units = order.total_units))]
    async fn fulfil(&mut self, order: WorkOrder, coordinator: SocketAddr) -> Result<OrderSummary> {
        let start = Instant::now();
        let worker_count = self.config.num_workers;

        self.pool.reset(order.total_units)?;

        let confirmation = Message::OrderConfirm(OrderConfirmation { worker_count });
        self.transport.send_to(&confirmation, coordinator).await?;
        tracing::info!("FACTORY sent this Order Confirmation to the client {confirmation}");
        increment_orders_accepted();

        let (reports_tx, reports_rx) = mpsc::channel(self.config.report_buffer_size);
        let crew = Crew::spawn(self.profiles.draw(worker_count), &self.pool, reports_tx);

        let relayed = tokio::select! {
            () = self.shutdown_token.cancelled() => {
                tracing::warn!("Shutdown requested with {} workers mid-order", crew.active());
                crew.abort();
                return Err(Error::ServiceShutdown);
            }
            relayed = relay_reports(&self.transport, reports_rx, coordinator) => relayed,
        };
        let reports_relayed = match relayed {
            Ok(count) => count,
            Err(e) => {
                crew.abort();
                return Err(e);
            }
        };

        let outcomes = crew.join().await?;
        let elapsed = start.elapsed();
        record_order_duration(elapsed.as_secs_f64() * 1000.0);

        Ok(OrderSummary {
            coordinator,
            order,
            outcomes,
            reports_relayed,
            elapsed,
        })
    }

    /// Answers a datagram that is not a valid order.
    async fn reject(&self, from: SocketAddr, reason: &str) -> Result<()> {
        tracing::warn!("Protocol fault from {from}: {reason}");
        increment_protocol_faults();
        self.transport.send_to(&Message::ProtocolError, from).await
    }

    /// Tells the most recent counterpart that the factory is going away.
    async fn notify_shutdown(&self) {
        tracing::info!("Shutdown signal received, terminating gracefully...");
        let Some(counterpart) = self.counterpart else {
            return;
        };
        match self.transport.send_to(&Message::ProtocolError, counterpart).await {
            Ok(()) => tracing::info!("Sent PROTOCOL_ERROR to {counterpart}"),
            Err(e) => tracing::error!("Error sending shutdown notice to {counterpart}: {e}"),
        }
    }
}

fn log_summary(summary: &OrderSummary) {
    for outcome in &summary.outcomes {
        tracing::info!(
            "Factory {} made {} parts in {} iterations",
            outcome.worker_id,
            outcome.units_made,
            outcome.iterations
        );
    }
    tracing::info!(
        "Order of {} units for {} completed: {} parts made, {} reports relayed in {:.1?}",
        summary.order.total_units,
        summary.coordinator,
        summary.units_made(),
        summary.reports_relayed,
        summary.elapsed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use factory_core::transport::{MemoryNetwork, MemoryTransport};
    use factory_core::{CompletionReport, MESSAGE_SIZE, WorkerId};
    use tokio::task::JoinHandle;

    const SERVER: SocketAddr = SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 1)),
        50015,
    );
    const CLIENT: SocketAddr = SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 2)),
        40000,
    );

    struct Harness {
        net: MemoryNetwork,
        client: MemoryTransport,
        token: CancellationToken,
        server: JoinHandle<(Result<()>, u64)>,
    }

    fn start(config: ServerConfig) -> Harness {
        let net = MemoryNetwork::new();
        let token = CancellationToken::new();
        let mut service = FactoryService::new(config, net.bind(SERVER).unwrap(), token.clone());
        let client = net.bind(CLIENT).unwrap();
        let server = tokio::spawn(async move {
            let result = service.serve().await;
            (result, service.orders_served())
        });
        Harness {
            net,
            client,
            token,
            server,
        }
    }

    async fn order(client: &MemoryTransport, total_units: u32) {
        client
            .send_to(&Message::Request(WorkOrder { total_units }), SERVER)
            .await
            .unwrap();
    }

    /// Receives until `workers` completions have arrived.
    async fn drain(client: &MemoryTransport, workers: u32) -> (u64, u32) {
        let mut units = 0;
        let mut completions = 0;
        while completions < workers {
            match client.recv_from().await.unwrap().0 {
                Message::Production(r) => units += u64::from(r.units_made),
                Message::Completion(_) => completions += 1,
                other => panic!("unexpected {other}"),
            }
        }
        (units, completions)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn serves_consecutive_orders() {
        let h = start(ServerConfig::fixed(3, 7, 1));

        for total in [100, 0, 41] {
            order(&h.client, total).await;
            assert_eq!(
                h.client.recv_from().await.unwrap(),
                (
                    Message::OrderConfirm(OrderConfirmation { worker_count: 3 }),
                    SERVER
                )
            );
            assert_eq!(drain(&h.client, 3).await, (u64::from(total), 3));
        }

        h.token.cancel();
        let (result, served) = h.server.await.unwrap();
        assert_eq!(result, Ok(()));
        assert_eq!(served, 3);
    }

    #[tokio::test]
    async fn empty_order_yields_only_completions() {
        let h = start(ServerConfig::fixed(2, 10, 1));
        order(&h.client, 0).await;

        let mut messages = Vec::new();
        for _ in 0..3 {
            messages.push(h.client.recv_from().await.unwrap().0);
        }
        assert_eq!(
            messages[0],
            Message::OrderConfirm(OrderConfirmation { worker_count: 2 })
        );
        let mut completed: Vec<WorkerId> = messages[1..]
            .iter()
            .map(|m| match m {
                Message::Completion(CompletionReport { worker_id }) => *worker_id,
                other => panic!("unexpected {other}"),
            })
            .collect();
        completed.sort();
        assert_eq!(completed, vec![WorkerId(1), WorkerId(2)]);

        h.token.cancel();
        h.server.await.unwrap().0.unwrap();
    }

    #[tokio::test]
    async fn stray_messages_are_answered_with_protocol_error() {
        let h = start(ServerConfig::fixed(1, 10, 1));

        h.client
            .send_to(
                &Message::Completion(CompletionReport {
                    worker_id: WorkerId(1),
                }),
                SERVER,
            )
            .await
            .unwrap();
        assert_eq!(
            h.client.recv_from().await.unwrap(),
            (Message::ProtocolError, SERVER)
        );

        // Undecodable bytes are treated the same way.
        assert!(h.net.inject(CLIENT, SERVER, vec![7_u8; MESSAGE_SIZE]));
        assert_eq!(h.client.recv_from().await.unwrap().0, Message::ProtocolError);

        // The server is still serving.
        order(&h.client, 5).await;
        assert!(matches!(
            h.client.recv_from().await.unwrap().0,
            Message::OrderConfirm(_)
        ));
        assert_eq!(drain(&h.client, 1).await, (5, 1));

        h.token.cancel();
        let (result, served) = h.server.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(served, 1);
    }

    #[tokio::test]
    async fn oversized_orders_are_rejected() {
        let mut config = ServerConfig::fixed(1, 10, 1);
        config.max_order_units = 10;
        let h = start(config);

        order(&h.client, 11).await;
        assert_eq!(h.client.recv_from().await.unwrap().0, Message::ProtocolError);

        h.token.cancel();
        let (_, served) = h.server.await.unwrap();
        assert_eq!(served, 0);
    }

    #[tokio::test]
    async fn shutdown_mid_order_notifies_the_client() {
        let h = start(ServerConfig::fixed(2, 1, 60_000));
        order(&h.client, 10).await;
        assert!(matches!(
            h.client.recv_from().await.unwrap().0,
            Message::OrderConfirm(_)
        ));

        h.token.cancel();
        assert_eq!(h.server.await.unwrap().0, Ok(()));
        assert_eq!(h.client.recv_from().await.unwrap().0, Message::ProtocolError);
    }

    #[tokio::test]
    async fn shutdown_before_any_order_sends_nothing() {
        let h = start(ServerConfig::fixed(1, 1, 1));
        h.token.cancel();
        assert_eq!(h.server.await.unwrap().0, Ok(()));

        let nothing =
            tokio::time::timeout(Duration::from_millis(50), h.client.recv_from()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn relay_failure_ends_the_service() {
        let h = start(ServerConfig::fixed(1, 1, 1));
        h.net.break_link(SERVER).unwrap();
        order(&h.client, 3).await;

        let (result, served) = h.server.await.unwrap();
        assert!(matches!(result, Err(Error::Transport { .. })));
        assert_eq!(served, 0);
    }
}
