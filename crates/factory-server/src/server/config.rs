use anyhow::bail;
use clap::Parser;
use core::ops::RangeInclusive;
use std::net::{IpAddr, SocketAddr};

/// Runtime configuration for the `factory-server` binary.
///
/// These settings control how many workers serve each order, how their
/// capacities and service times are drawn, and where the server listens. All
/// values are parsed from CLI arguments or environment variables, with
/// defaults matching the classic single-line factory.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "factory-server",
    version,
    about = "A UDP factory that splits each order across concurrent workers"
)]
pub struct CliArgs {
    /// Number of workers that serve every order concurrently.
    ///
    /// Each worker is assigned an ID in `1..=NUM_WORKERS` and this count is
    /// sent back in the order confirmation.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 1)]
    pub num_workers: u32,

    /// UDP port to listen on.
    ///
    /// Environment variable: `FACTORY_PORT`
    #[arg(long, env = "FACTORY_PORT", default_value_t = 50015)]
    pub port: u16,

    /// Local IP address to bind.
    ///
    /// Environment variable: `FACTORY_BIND_IP`
    #[arg(long, env = "FACTORY_BIND_IP", default_value = "0.0.0.0")]
    pub bind_ip: IpAddr,

    /// Smallest number of units a worker may claim per cycle.
    ///
    /// Environment variable: `MIN_CAPACITY`
    #[arg(long, env = "MIN_CAPACITY", default_value_t = 10)]
    pub min_capacity: u32,

    /// Largest number of units a worker may claim per cycle. Set equal to
    /// `MIN_CAPACITY` for a fixed capacity.
    ///
    /// Environment variable: `MAX_CAPACITY`
    #[arg(long, env = "MAX_CAPACITY", default_value_t = 50)]
    pub max_capacity: u32,

    /// Shortest simulated service time per cycle, in milliseconds.
    ///
    /// Environment variable: `MIN_DURATION_MS`
    #[arg(long, env = "MIN_DURATION_MS", default_value_t = 500)]
    pub min_duration_ms: u32,

    /// Longest simulated service time per cycle, in milliseconds. Set equal to
    /// `MIN_DURATION_MS` for a fixed service time.
    ///
    /// Environment variable: `MAX_DURATION_MS`
    #[arg(long, env = "MAX_DURATION_MS", default_value_t = 1200)]
    pub max_duration_ms: u32,

    /// Seed for drawing worker capacities and service times. Without a seed,
    /// every run draws fresh values.
    ///
    /// Environment variable: `PROFILE_SEED`
    #[arg(long, env = "PROFILE_SEED")]
    pub seed: Option<u64>,

    /// Capacity of the channel between workers and the report relay.
    ///
    /// Workers block on a full channel, so this bounds how far production
    /// can run ahead of the network.
    ///
    /// Environment variable: `REPORT_BUFFER_SIZE`
    #[arg(long, env = "REPORT_BUFFER_SIZE", default_value_t = 64)]
    pub report_buffer_size: usize,

    /// Largest order the server accepts. Larger orders are answered with a
    /// protocol error.
    ///
    /// Environment variable: `MAX_ORDER_UNITS`
    #[arg(long, env = "MAX_ORDER_UNITS", default_value_t = u32::MAX)]
    pub max_order_units: u32,
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub num_workers: u32,
    pub bind_addr: SocketAddr,
    pub capacity: RangeInclusive<u32>,
    pub duration_ms: RangeInclusive<u32>,
    pub seed: Option<u64>,
    pub report_buffer_size: usize,
    pub max_order_units: u32,
}

impl ServerConfig {
    /// A configuration where every worker has the same capacity and service
    /// time, listening on an ephemeral localhost port.
    pub fn fixed(num_workers: u32, capacity: u32, duration_ms: u32) -> Self {
        Self {
            num_workers,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            capacity: capacity..=capacity,
            duration_ms: duration_ms..=duration_ms,
            seed: None,
            report_buffer_size: 64,
            max_order_units: u32::MAX,
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.min_capacity == 0 {
            bail!("MIN_CAPACITY must be greater than 0");
        }

        if args.min_capacity > args.max_capacity {
            bail!(
                "MIN_CAPACITY ({}) exceeds MAX_CAPACITY ({})",
                args.min_capacity,
                args.max_capacity
            );
        }

        if args.min_duration_ms > args.max_duration_ms {
            bail!(
                "MIN_DURATION_MS ({}) exceeds MAX_DURATION_MS ({})",
                args.min_duration_ms,
                args.max_duration_ms
            );
        }

        if args.report_buffer_size == 0 {
            bail!("REPORT_BUFFER_SIZE must be greater than 0");
        }

        Ok(Self {
            num_workers: args.num_workers,
            bind_addr: SocketAddr::new(args.bind_ip, args.port),
            capacity: args.min_capacity..=args.max_capacity,
            duration_ms: args.min_duration_ms..=args.max_duration_ms,
            seed: args.seed,
            report_buffer_size: args.report_buffer_size,
            max_order_units: args.max_order_units,
        })
    }
}
