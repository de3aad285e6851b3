use factory_core::transport::MemoryNetwork;
use factory_core::{Error, Message, Transport, UdpTransport, WorkOrder, WorkerId};
use factory_server::server::config::ServerConfig;
use factory_server::server::service::handler::FactoryService;
use procurement::client::coordinator::Coordinator;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SERVER: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 1)),
    50015,
);
const CLIENT: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 2)),
    40000,
);

fn spawn_server<T: Transport>(
    config: ServerConfig,
    transport: T,
) -> (CancellationToken, JoinHandle<factory_core::Result<()>>) {
    let token = CancellationToken::new();
    let mut service = FactoryService::new(config, transport, token.clone());
    let handle = tokio::spawn(async move { service.serve().await });
    (token, handle)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn order_is_fulfilled_over_memory_network() {
    let net = MemoryNetwork::new();
    let (token, server) = spawn_server(ServerConfig::fixed(5, 13, 1), net.bind(SERVER).unwrap());
    let coordinator = Coordinator::new(net.bind(CLIENT).unwrap(), SERVER);

    for total_units in [1_000, 1, 0] {
        let summary = coordinator.run(WorkOrder { total_units }).await.unwrap();

        assert!(summary.is_fulfilled());
        assert_eq!(summary.total_units, u64::from(total_units));
        assert_eq!(summary.per_worker.len(), 5);
        assert!(summary.inconsistencies.is_empty());
        for stats in &summary.per_worker {
            // Every claim is at most 13 units.
            assert!(stats.units <= u64::from(stats.iterations) * 13);
        }
    }

    token.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_workers_split_one_hundred() {
    let net = MemoryNetwork::new();
    let mut config = ServerConfig::fixed(2, 50, 5);
    config.capacity = 50..=60;
    config.seed = Some(7);
    let (token, server) = spawn_server(config, net.bind(SERVER).unwrap());
    let coordinator = Coordinator::new(net.bind(CLIENT).unwrap(), SERVER);

    let summary = coordinator.run(WorkOrder { total_units: 100 }).await.unwrap();

    assert_eq!(summary.total_units, 100);
    let one = summary.worker(WorkerId(1)).unwrap();
    let two = summary.worker(WorkerId(2)).unwrap();
    assert_eq!(one.units + two.units, 100);
    assert!(one.iterations <= 2 && two.iterations <= 2);
    assert!(one.units <= 60 * u64::from(one.iterations));
    assert!(two.units <= 60 * u64::from(two.iterations));

    token.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn protocol_error_mid_run_aborts_the_coordinator() {
    let net = MemoryNetwork::new();
    let (token, server) =
        spawn_server(ServerConfig::fixed(2, 1, 60_000), net.bind(SERVER).unwrap());
    let coordinator = Coordinator::new(net.bind(CLIENT).unwrap(), SERVER);

    let run = tokio::spawn(async move { coordinator.run(WorkOrder { total_units: 10 }).await });

    // Workers are busy for a minute; fake a server-side error in the meantime.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(net.inject(SERVER, CLIENT, Message::ProtocolError.encode().to_vec()));

    assert!(matches!(
        run.await.unwrap(),
        Err(Error::ProtocolFault { .. })
    ));

    token.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn server_shutdown_faults_the_coordinator() {
    let net = MemoryNetwork::new();
    let (token, server) =
        spawn_server(ServerConfig::fixed(3, 1, 60_000), net.bind(SERVER).unwrap());
    let coordinator = Coordinator::new(net.bind(CLIENT).unwrap(), SERVER);

    let run = tokio::spawn(async move { coordinator.run(WorkOrder { total_units: 10 }).await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    token.cancel();
    server.await.unwrap().unwrap();
    assert!(matches!(
        run.await.unwrap(),
        Err(Error::ProtocolFault { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn order_is_fulfilled_over_loopback_udp() {
    let server_transport = UdpTransport::bind("127.0.0.1:0").await.unwrap();
    let server_addr = server_transport.local_addr().unwrap();
    let (token, server) = spawn_server(ServerConfig::fixed(3, 20, 2), server_transport);

    let coordinator = Coordinator::new(UdpTransport::bind("127.0.0.1:0").await.unwrap(), server_addr);
    let summary = coordinator.run(WorkOrder { total_units: 150 }).await.unwrap();

    assert!(summary.is_fulfilled());
    assert_eq!(summary.per_worker.len(), 3);
    assert_eq!(
        summary.per_worker.iter().map(|s| s.iterations).sum::<u32>(),
        150 / 20 + 1
    );

    token.cancel();
    server.await.unwrap().unwrap();
}
