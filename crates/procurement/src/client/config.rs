use anyhow::bail;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};

/// Command line for the `procurement` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "procurement",
    version,
    about = "Places one order with a factory server and reports what was made"
)]
pub struct CliArgs {
    /// Number of units to order.
    ///
    /// Environment variable: `ORDER_SIZE`
    #[arg(env = "ORDER_SIZE")]
    pub order_size: u32,

    /// IP address of the factory server.
    ///
    /// Environment variable: `SERVER_IP`
    #[arg(env = "SERVER_IP")]
    pub server_ip: IpAddr,

    /// UDP port of the factory server.
    ///
    /// Environment variable: `PORT`
    #[arg(env = "PORT")]
    pub port: u16,

    /// Local address to send from and receive reports on.
    ///
    /// Environment variable: `PROCUREMENT_BIND_ADDR`
    #[arg(long, env = "PROCUREMENT_BIND_ADDR", default_value = "0.0.0.0:0")]
    pub bind_addr: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcurementConfig {
    pub order_size: u32,
    pub server_addr: SocketAddr,
    pub bind_addr: SocketAddr,
}

impl TryFrom<CliArgs> for ProcurementConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.port == 0 {
            bail!("PORT must be greater than 0");
        }

        if args.server_ip.is_unspecified() {
            bail!("SERVER_IP ({}) is not a reachable address", args.server_ip);
        }

        if args.server_ip.is_ipv4() != args.bind_addr.is_ipv4() {
            bail!(
                "Cannot reach {} from a socket bound to {}",
                args.server_ip,
                args.bind_addr
            );
        }

        Ok(Self {
            order_size: args.order_size,
            server_addr: SocketAddr::new(args.server_ip, args.port),
            bind_addr: args.bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ProcurementConfig> {
        let args = CliArgs::try_parse_from(std::iter::once("procurement").chain(args.iter().copied()))?;
        ProcurementConfig::try_from(args)
    }

    #[test]
    fn positional_arguments() {
        let config = parse(&["100", "127.0.0.1", "50015"]).unwrap();
        assert_eq!(
            config,
            ProcurementConfig {
                order_size: 100,
                server_addr: "127.0.0.1:50015".parse().unwrap(),
                bind_addr: "0.0.0.0:0".parse().unwrap(),
            }
        );
    }

    #[test]
    fn custom_bind_address() {
        let config = parse(&["5", "::1", "9000", "--bind-addr", "[::1]:0"]).unwrap();
        assert_eq!(config.bind_addr, "[::1]:0".parse().unwrap());
        assert_eq!(config.server_addr, "[::1]:9000".parse().unwrap());
    }

    #[test]
    fn rejects_bad_targets() {
        assert!(parse(&["5", "127.0.0.1", "0"]).is_err());
        assert!(parse(&["5", "0.0.0.0", "50015"]).is_err());
        assert!(parse(&["5", "::1", "50015"]).is_err());
        assert!(parse(&["-5", "127.0.0.1", "50015"]).is_err());
        assert!(parse(&["5", "not-an-ip", "50015"]).is_err());
    }
}
