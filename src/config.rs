//! Command line configuration of the relay daemon

use std::{net::Ipv4Addr, str::FromStr};

use clap::Parser;
use timestamped_socket::interface::InterfaceName;

use crate::RelayConfig;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// IP of the other endpoint of the tunnel that PTP messages are forwarded to
    #[clap(long = "tunopip", default_value = "10.60.0.1")]
    pub tunnel_peer: String,
    /// Exchange PTP with a single unicast peer instead of the multicast groups
    #[clap(long)]
    pub unicast: bool,
    /// Deliver residence times in Follow_Up and Delay_Resp messages
    #[clap(long = "twostep")]
    pub two_step: bool,
    /// Interface of the local network port (multicast only)
    #[clap(long = "portif", default_value = "eth1")]
    pub port_interface: String,
    /// IP of the connected PTP client or server (unicast only)
    #[clap(long = "unicastip", default_value = "10.100.201.200")]
    pub unicast_peer: String,
    /// Log level: error, warn, info, debug or trace
    #[clap(long, default_value = "info")]
    pub loglevel: String,
}

/// How the relay reaches the local network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    Unicast { peer: Ipv4Addr },
    Multicast { interface: InterfaceName },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub loglevel: log::LevelFilter,
    pub tunnel_peer: Ipv4Addr,
    pub network_mode: NetworkMode,
    pub relay: RelayConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid log level {0:?}")]
    LogLevel(String),
    #[error("invalid {what} address {value:?}")]
    Address { what: &'static str, value: String },
    #[error("invalid interface name {0:?}")]
    Interface(String),
}

fn parse_addr(what: &'static str, value: &str) -> Result<Ipv4Addr, ConfigError> {
    Ipv4Addr::from_str(value).map_err(|_| ConfigError::Address {
        what,
        value: value.to_owned(),
    })
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let loglevel = log::LevelFilter::from_str(&args.loglevel)
            .map_err(|_| ConfigError::LogLevel(args.loglevel.clone()))?;

        let tunnel_peer = parse_addr("tunnel peer", &args.tunnel_peer)?;

        let network_mode = if args.unicast {
            NetworkMode::Unicast {
                peer: parse_addr("unicast peer", &args.unicast_peer)?,
            }
        } else {
            NetworkMode::Multicast {
                interface: InterfaceName::from_str(&args.port_interface)
                    .map_err(|_| ConfigError::Interface(args.port_interface.clone()))?,
            }
        };

        Ok(Config {
            loglevel,
            tunnel_peer,
            network_mode,
            relay: RelayConfig {
                two_step: args.two_step,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, ConfigError> {
        let args = Args::try_parse_from(std::iter::once("ptp-tt").chain(args.iter().copied()))
            .unwrap();
        Config::try_from(args)
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();

        assert_eq!(config.loglevel, log::LevelFilter::Info);
        assert_eq!(config.tunnel_peer, Ipv4Addr::new(10, 60, 0, 1));
        assert_eq!(
            config.network_mode,
            NetworkMode::Multicast {
                interface: InterfaceName::from_str("eth1").unwrap()
            }
        );
        assert!(!config.relay.two_step);
    }

    #[test]
    fn unicast_two_step() {
        let config = parse(&[
            "--unicast",
            "--twostep",
            "--unicastip",
            "192.168.1.20",
            "--tunopip",
            "10.45.0.7",
            "--loglevel",
            "trace",
        ])
        .unwrap();

        assert_eq!(config.loglevel, log::LevelFilter::Trace);
        assert_eq!(config.tunnel_peer, Ipv4Addr::new(10, 45, 0, 7));
        assert_eq!(
            config.network_mode,
            NetworkMode::Unicast {
                peer: Ipv4Addr::new(192, 168, 1, 20)
            }
        );
        assert!(config.relay.two_step);
    }

    #[test]
    fn unicast_peer_ignored_in_multicast_mode() {
        let config = parse(&["--unicastip", "not an address"]).unwrap();
        assert!(matches!(config.network_mode, NetworkMode::Multicast { .. }));
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(
            parse(&["--tunopip", "upf.local"]),
            Err(ConfigError::Address { what: "tunnel peer", .. })
        ));
        assert!(matches!(
            parse(&["--unicast", "--unicastip", "300.1.1.1"]),
            Err(ConfigError::Address { what: "unicast peer", .. })
        ));
        assert!(matches!(
            parse(&["--portif", ""]),
            Err(ConfigError::Interface(_))
        ));
        assert!(matches!(
            parse(&["--portif", "a-very-long-interface-name"]),
            Err(ConfigError::Interface(name)) if name == "a-very-long-interface-name"
        ));
        assert!(matches!(
            parse(&["--loglevel", "loud"]),
            Err(ConfigError::LogLevel(_))
        ));
    }
}
