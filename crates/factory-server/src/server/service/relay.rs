use crate::server::telemetry::increment_reports_relayed;
use factory_core::{Message, Result, Transport};
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Forwards every report the workers emit to `coordinator` until all workers
/// have dropped their senders.
///
/// Reports are sent in the order they were queued, which keeps each worker's
/// own reports in emission order. Reports from different workers interleave
/// however the scheduler ran them. Nothing is acknowledged or retried.
///
/// Returns the number of reports sent.
///
/// # Errors
///
/// Returns the first transport error. The caller treats it as fatal for the
/// order; the receiver is dropped, so workers stop at their next report.
pub async fn relay_reports<T: Transport>(
    transport: &T,
    mut reports: mpsc::Receiver<Message>,
    coordinator: SocketAddr,
) -> Result<u64> {
    let mut relayed = 0;

    while let Some(report) = reports.recv().await {
        transport.send_to(&report, coordinator).await?;
        tracing::trace!("Relayed {report} to {coordinator}");
        increment_reports_relayed();
        relayed += 1;
    }

    Ok(relayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use factory_core::transport::MemoryNetwork;
    use factory_core::{CompletionReport, Error, WorkerId};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn completion(id: u32) -> Message {
        Message::Completion(CompletionReport {
            worker_id: WorkerId(id),
        })
    }

    #[tokio::test]
    async fn forwards_in_queue_order() {
        let net = MemoryNetwork::new();
        let server = net.bind(addr(1)).unwrap();
        let client = net.bind(addr(2)).unwrap();

        let (tx, rx) = mpsc::channel(4);
        for id in [2, 1, 3] {
            tx.send(completion(id)).await.unwrap();
        }
        drop(tx);

        assert_eq!(relay_reports(&server, rx, addr(2)).await.unwrap(), 3);
        for id in [2, 1, 3] {
            assert_eq!(client.recv_from().await.unwrap(), (completion(id), addr(1)));
        }
    }

    #[tokio::test]
    async fn send_failure_stops_the_relay() {
        let net = MemoryNetwork::new();
        let server = net.bind(addr(1)).unwrap();
        let _client = net.bind(addr(2)).unwrap();
        net.break_link(addr(1)).unwrap();

        let (tx, rx) = mpsc::channel(4);
        tx.send(completion(1)).await.unwrap();
        drop(tx);

        let err = relay_reports(&server, rx, addr(2)).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}
