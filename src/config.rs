//! CLI flags and resolved configuration.
//!
//! Flags are parsed by `clap`; each endpoint flag also reads an `I2PCTL_*`
//! environment variable, with explicit flags taking precedence over the
//! environment and the environment over the compiled defaults.
//!
//! The parsed flags are collapsed into a single immutable [`Config`] that is
//! built once in `main` and passed by reference everywhere else.

use clap::Parser;

/// Password the router ships with. Used for the startup warning when the
/// operator has not overridden it.
pub const DEFAULT_PASSWORD: &str = "itoopie";

const METHODS_HELP: &str = "\
Commands (selected with --method):
  echo               i2pcontrol:Echo, with the remaining arguments as the message
  restart            i2pcontrol:Restart
  graceful-restart   i2pcontrol:RestartGraceful
  shutdown           i2pcontrol:Shutdown
  graceful-shutdown  i2pcontrol:ShutdownGraceful
  update             i2pcontrol:FindUpdates, then i2pcontrol:Update if one is found
  find-update        i2pcontrol:FindUpdates
  stat               i2pcontrol:RouterInfo (router status)
  netstat            i2pcontrol:RouterInfo (network status)
  reseedstat         i2pcontrol:RouterInfo (reseed state)
  tunstat            i2pcontrol:RouterInfo (participating tunnel count)
  ratestat <stat> <period-ms>
                     i2pcontrol:GetRate

To start a graceful shutdown and block until the router has drained its
participating tunnels:

  i2pctl --block --method=graceful-shutdown";

/// CLI arguments parsed by `clap`.
#[derive(Parser)]
#[command(
    name = "i2pctl",
    version,
    about = "Terminal client to monitor and manage an I2P router via the I2PControl API",
    after_help = METHODS_HELP
)]
pub struct Cli {
    /// Host of the I2PControl interface.
    #[arg(long, env = "I2PCTL_HOST", default_value = "localhost")]
    pub host: String,

    /// Port of the I2PControl interface.
    #[arg(long, env = "I2PCTL_PORT", default_value = "7657")]
    pub port: String,

    /// HTTP path to the I2PControl endpoint.
    #[arg(long, env = "I2PCTL_PATH", default_value = "jsonrpc")]
    pub path: String,

    /// Password for the I2PControl interface.
    #[arg(long, env = "I2PCTL_PASSWORD", default_value = DEFAULT_PASSWORD)]
    pub password: String,

    /// Command to invoke (see the table below).
    #[arg(long, default_value = "echo")]
    pub method: String,

    /// Block until the router has no participating tunnels left.
    /// Only meaningful with a shutdown or restart command.
    #[arg(long)]
    pub block: bool,

    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,

    /// Positional arguments: the message for `echo`, `<stat> <period-ms>`
    /// for `ratestat`.
    pub args: Vec<String>,
}

/// Immutable configuration for one run.
pub struct Config {
    pub host: String,
    pub port: String,
    pub path: String,
    pub password: String,
    pub method: String,
    pub args: Vec<String>,
    pub block: bool,
    pub verbose: bool,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            path: cli.path,
            password: cli.password,
            method: cli.method,
            args: cli.args,
            block: cli.block,
            verbose: cli.verbose,
        }
    }

    /// URL the JSON-RPC client posts to.
    pub fn endpoint_url(&self) -> String {
        format!(
            "http://{}:{}/{}",
            self.host,
            self.port,
            self.path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::from_cli(Cli::try_parse_from(args).expect("parse failed"))
    }

    #[test]
    fn defaults() {
        let config = parse(&["i2pctl"]);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, "7657");
        assert_eq!(config.path, "jsonrpc");
        assert_eq!(config.password, "itoopie");
        assert_eq!(config.method, "echo");
        assert!(!config.block);
        assert!(!config.verbose);
        assert!(config.args.is_empty());
    }

    #[test]
    fn positional_args_after_method() {
        let config = parse(&["i2pctl", "--method", "ratestat", "bw.sendBps", "60000"]);
        assert_eq!(config.method, "ratestat");
        assert_eq!(config.args, vec!["bw.sendBps", "60000"]);
    }

    #[test]
    fn block_and_verbose_flags() {
        let config = parse(&["i2pctl", "--block", "-v", "--method", "graceful-shutdown"]);
        assert!(config.block);
        assert!(config.verbose);
        assert_eq!(config.method, "graceful-shutdown");
    }

    #[test]
    fn endpoint_url_from_parts() {
        let config = parse(&["i2pctl", "--host", "127.0.0.1", "--port", "7650"]);
        assert_eq!(config.endpoint_url(), "http://127.0.0.1:7650/jsonrpc");
    }

    #[test]
    fn endpoint_url_strips_leading_slash() {
        let config = parse(&["i2pctl", "--path", "/jsonrpc"]);
        assert_eq!(config.endpoint_url(), "http://localhost:7657/jsonrpc");
    }
}
