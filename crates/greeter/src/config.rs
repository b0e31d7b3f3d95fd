use std::net::SocketAddr;

use clap::Parser;
use tracing::Level;

use crate::handlers::{HandlerConfig, StatusSideChannel};

/// Configuration of the greeter server process.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "greeter-server",
    version,
    about = "Serves the Greeter service over the binary protocol and a JSON gateway"
)]
pub struct Config {
    /// Address of the binary protocol listener.
    #[arg(long, env = "GREETER_RPC_ADDR", default_value = "0.0.0.0:9091")]
    pub rpc_addr: SocketAddr,

    /// Address of the JSON gateway listener.
    #[arg(long, env = "GREETER_HTTP_ADDR", default_value = "0.0.0.0:4501")]
    pub http_addr: SocketAddr,

    /// Reject empty names in SayHello with InvalidArgument.
    #[arg(long)]
    pub strict_names: bool,

    /// Make SayHello send a fixed header and trailer.
    #[arg(long)]
    pub hello_metadata: bool,

    /// Metadata the Status method attaches besides the status.
    #[arg(long, value_enum, default_value_t = StatusSideChannel::Trailer)]
    pub status_side_channel: StatusSideChannel,

    /// Maximum level of logged events.
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl Config {
    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            strict_names: self.strict_names,
            hello_metadata: self.hello_metadata,
            status_side_channel: self.status_side_channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["greeter-server"]).unwrap();
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.handler_config(), HandlerConfig::default());
        // the env fallback may be set by whoever runs the tests
        if std::env::var_os("GREETER_RPC_ADDR").is_none() {
            assert_eq!(config.rpc_addr, "0.0.0.0:9091".parse::<SocketAddr>().unwrap());
        }
        if std::env::var_os("GREETER_HTTP_ADDR").is_none() {
            assert_eq!(config.http_addr, "0.0.0.0:4501".parse::<SocketAddr>().unwrap());
        }
    }

    #[test]
    fn flags() {
        let config = Config::try_parse_from([
            "greeter-server",
            "--rpc-addr",
            "127.0.0.1:1000",
            "--http-addr",
            "127.0.0.1:1001",
            "--strict-names",
            "--hello-metadata",
            "--status-side-channel",
            "header",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(config.rpc_addr, "127.0.0.1:1000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.http_addr, "127.0.0.1:1001".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(
            config.handler_config(),
            HandlerConfig {
                strict_names: true,
                hello_metadata: true,
                status_side_channel: StatusSideChannel::Header,
            }
        );

        assert!(Config::try_parse_from(["greeter-server", "--status-side-channel", "body"]).is_err());
    }
}
