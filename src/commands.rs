//! Command table and dispatch.
//!
//! Every command the CLI accepts is one [`CommandSpec`] entry in
//! [`COMMANDS`]: its name, how many positional arguments it requires, and
//! whether it is shutdown-class (success should hand control to the drain
//! monitor when `--block` is set). [`dispatch`] runs exactly one handler;
//! each handler wraps exactly one capability call, except `update`, which
//! chains `FindUpdates` into `Update`.
//!
//! Unknown command names are a lookup failure surfaced as
//! [`CommandError::Unknown`]; a typo in `--method` must not be a silent
//! no-op when the valid verbs include `shutdown`.

use tracing::info;

use crate::client::{ClientError, RouterControl};

/// Which handler a command name maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Echo,
    Restart,
    GracefulRestart,
    Shutdown,
    GracefulShutdown,
    Update,
    FindUpdate,
    Stat,
    NetStat,
    ReseedStat,
    TunStat,
    RateStat,
}

/// One entry in the command table.
pub struct CommandSpec {
    pub name: &'static str,
    pub kind: CommandKind,
    /// Minimum positional arguments; checked before the handler runs.
    pub required_args: usize,
    /// Whether success should trigger the drain monitor under `--block`.
    pub shutdown_class: bool,
}

/// The full command table. Lookup is by exact name.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "echo",
        kind: CommandKind::Echo,
        required_args: 0,
        shutdown_class: false,
    },
    CommandSpec {
        name: "restart",
        kind: CommandKind::Restart,
        required_args: 0,
        shutdown_class: true,
    },
    CommandSpec {
        name: "graceful-restart",
        kind: CommandKind::GracefulRestart,
        required_args: 0,
        shutdown_class: true,
    },
    CommandSpec {
        name: "shutdown",
        kind: CommandKind::Shutdown,
        required_args: 0,
        shutdown_class: true,
    },
    CommandSpec {
        name: "graceful-shutdown",
        kind: CommandKind::GracefulShutdown,
        required_args: 0,
        shutdown_class: true,
    },
    CommandSpec {
        name: "update",
        kind: CommandKind::Update,
        required_args: 0,
        shutdown_class: false,
    },
    CommandSpec {
        name: "find-update",
        kind: CommandKind::FindUpdate,
        required_args: 0,
        shutdown_class: false,
    },
    CommandSpec {
        name: "stat",
        kind: CommandKind::Stat,
        required_args: 0,
        shutdown_class: false,
    },
    CommandSpec {
        name: "netstat",
        kind: CommandKind::NetStat,
        required_args: 0,
        shutdown_class: false,
    },
    CommandSpec {
        name: "reseedstat",
        kind: CommandKind::ReseedStat,
        required_args: 0,
        shutdown_class: false,
    },
    CommandSpec {
        name: "tunstat",
        kind: CommandKind::TunStat,
        required_args: 0,
        shutdown_class: false,
    },
    CommandSpec {
        name: "ratestat",
        kind: CommandKind::RateStat,
        required_args: 2,
        shutdown_class: false,
    },
];

/// Find a command by exact name.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// What dispatch tells the caller about the command that just ran.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// The command was shutdown-class; the drain monitor should run if the
    /// operator asked to block.
    pub produces_shutdown: bool,
}

/// Run the handler for `spec` against `client`.
///
/// Positional arguments are validated before anything touches the network.
/// Any remote error aborts the command; no handler recovers.
pub async fn dispatch<C: RouterControl>(
    client: &C,
    spec: &CommandSpec,
    args: &[String],
) -> Result<DispatchOutcome, CommandError> {
    if args.len() < spec.required_args {
        return Err(CommandError::BadArgument(format!(
            "{} requires {} positional arguments, got {}",
            spec.name,
            spec.required_args,
            args.len()
        )));
    }

    match spec.kind {
        CommandKind::Echo => {
            let message = client.echo(&args.join(" ")).await?;
            info!("{message}");
        }
        CommandKind::Restart => info!("{}", client.restart().await?),
        CommandKind::GracefulRestart => info!("{}", client.restart_graceful().await?),
        CommandKind::Shutdown => info!("{}", client.shutdown().await?),
        CommandKind::GracefulShutdown => info!("{}", client.shutdown_graceful().await?),
        CommandKind::Update => {
            if client.find_updates().await? {
                info!("You need an update");
                info!("{}", client.update().await?);
            } else {
                info!("You don't need an update");
            }
        }
        CommandKind::FindUpdate => {
            if client.find_updates().await? {
                info!("You need an update");
            } else {
                info!("You don't need an update");
            }
        }
        CommandKind::Stat => info!("Router status: {}", client.status().await?),
        CommandKind::NetStat => info!("Network status: {}", client.net_status().await?),
        CommandKind::ReseedStat => {
            if client.reseeding().await? {
                info!("Router is reseeding");
            } else {
                info!("Router is not reseeding");
            }
        }
        CommandKind::TunStat => {
            info!("Participating tunnels: {}", client.participating_tunnels().await?);
        }
        CommandKind::RateStat => {
            let stat = &args[0];
            let period: i64 = args[1].parse().map_err(|_| {
                CommandError::BadArgument(format!(
                    "ratestat period must be an integer number of milliseconds, got '{}'",
                    args[1]
                ))
            })?;
            let value = client.rate_stat(stat, period).await?;
            info!("{stat} over {period}ms: {value}");
        }
    }

    Ok(DispatchOutcome {
        produces_shutdown: spec.shutdown_class,
    })
}

/// Errors surfaced by the dispatch layer.
#[derive(Debug)]
pub enum CommandError {
    /// The command name matched no table entry.
    Unknown(String),
    /// A positional argument was missing or malformed.
    BadArgument(String),
    /// The capability call behind the handler failed.
    Remote(ClientError),
}

impl From<ClientError> for CommandError {
    fn from(e: ClientError) -> Self {
        CommandError::Remote(e)
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Unknown(name) => {
                let known: Vec<&str> = COMMANDS.iter().map(|spec| spec.name).collect();
                write!(
                    f,
                    "Unknown command '{}', expected one of: {}",
                    name,
                    known.join(", ")
                )
            }
            CommandError::BadArgument(msg) => write!(f, "{}", msg),
            CommandError::Remote(e) => write!(f, "{}", e),
        }
    }
}
