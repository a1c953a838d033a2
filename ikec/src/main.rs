//! `ikec`: the admin CLI for the IKE/IPsec daemon core (spec §6 "CLI / admin
//! socket"). The textual config parser and the long-lived admin socket are
//! both out-of-scope external collaborators; this binary plays their role
//! for the core crates well enough to drive and observe them end-to-end,
//! reloading connection records from `IPSEC_CONFS` on every invocation
//! rather than talking to a persistent daemon process over a socket.

mod config;
mod rc;

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ike_kernel::MockKernel;
use ike_model::{Address, Autostart, ConnSerial, ConnectionKind};
use ike_routing::{dispatch, ConnectionStore, RoutingEvent};
use rc::ReturnCode;

#[derive(Parser, Debug)]
#[command(name = "ikec", version, about = "IKE/IPsec connection control")]
struct Cli {
    /// Root directory of connection records (spec §6 `IPSEC_CONFS`).
    #[arg(long, env = "IPSEC_CONFS", default_value = "/etc/ipsec.d/conns")]
    conns: PathBuf,

    #[arg(long, env = "VERBOSE_DEBUG")]
    verbose_debug: bool,

    /// Which stream admin output is routed to (spec §6 `LOG_STREAM`). Only
    /// `debug` changes anything here since the admin socket and separate
    /// whack log stream are out of scope; it widens the filter the same way
    /// `--verbose-debug` does.
    #[arg(long, env = "LOG_STREAM", default_value = "all")]
    log_stream: LogStream,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum LogStream {
    All,
    Whack,
    Debug,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a connection record (spec: `add`).
    Add { file: PathBuf },
    /// Forget a connection (spec: `delete`).
    Delete { name: String },
    /// Install ondemand/never-negotiate kernel policy (spec: `route`).
    Route { name: String },
    /// Remove kernel policy installed by `route` (spec: `unroute`).
    Unroute { name: String },
    /// Route then bring the connection fully up (spec: `up`).
    Up { name: String },
    /// Tear down the connection's child and IKE SAs (spec: `down`).
    Down { name: String },
    /// Trigger outbound negotiation (spec: `initiate [--remote-host]`).
    Initiate {
        name: String,
        #[arg(long)]
        remote_host: Option<IpAddr>,
    },
    /// Tear down and do not revive (spec: `terminate`).
    Terminate { name: String },
    /// Print every connection's name and routing state (spec: `status`).
    Status,
    /// Load and auto-route/auto-start every configured connection (spec:
    /// `listen`). A real transport-driven event loop needs a UDP socket and
    /// a DNS resolver, both out of scope; this loads the connection table,
    /// applies each connection's `auto=` policy once, and reports status.
    Listen,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let directives = if cli.verbose_debug || matches!(cli.log_stream, LogStream::Debug) {
        "debug"
    } else {
        "info"
    };
    if let Err(e) = logging::setup_global_subscriber(directives, false) {
        eprintln!("failed to set up logging: {e:#}");
        return ReturnCode::Log.exit_code();
    }

    match run(&cli) {
        Ok(code) => code.exit_code(),
        Err(e) => {
            tracing::error!("{e:#}");
            ReturnCode::Fatal.exit_code()
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ReturnCode> {
    match &cli.command {
        Command::Add { file } => cmd_add(cli, file),
        Command::Delete { name } => cmd_delete(cli, name),
        Command::Route { name } => cmd_route(cli, name),
        Command::Unroute { name } => cmd_unroute(cli, name),
        Command::Up { name } => cmd_up(cli, name),
        Command::Down { name } => cmd_down(cli, name),
        Command::Initiate { name, remote_host } => cmd_initiate(cli, name, *remote_host),
        Command::Terminate { name } => cmd_terminate(cli, name),
        Command::Status => cmd_status(cli),
        Command::Listen => cmd_listen(cli),
    }
}

fn load_store(cli: &Cli) -> anyhow::Result<ConnectionStore> {
    let mut store = ConnectionStore::new();
    if !cli.conns.is_dir() {
        return Ok(store);
    }
    for record in config::load_dir(&cli.conns)? {
        let connection = record.into_connection()?;
        store.insert(connection);
    }
    Ok(store)
}

fn find_serial(store: &ConnectionStore, name: &str) -> Option<ConnSerial> {
    store.by_name(name).next().map(|c| c.serial)
}

fn cmd_add(cli: &Cli, file: &PathBuf) -> anyhow::Result<ReturnCode> {
    let record = config::load_file(file)?;
    let connection = record.into_connection()?;

    let store = load_store(cli)?;
    if store.by_name(&connection.name).next().is_some() {
        tracing::warn!(name = %connection.name, "a connection with this name already exists");
        return Ok(ReturnCode::DupName);
    }

    tracing::info!(name = %connection.name, serial = %connection.serial, "connection registered");
    Ok(ReturnCode::Success)
}

fn cmd_delete(cli: &Cli, name: &str) -> anyhow::Result<ReturnCode> {
    let mut store = load_store(cli)?;
    let Some(serial) = find_serial(&store, name) else {
        tracing::warn!(%name, "no such connection");
        return Ok(ReturnCode::UnknownName);
    };
    store.remove(serial);
    tracing::info!(%name, "connection deleted");
    Ok(ReturnCode::Success)
}

fn cmd_route(cli: &Cli, name: &str) -> anyhow::Result<ReturnCode> {
    with_connection(cli, name, |c, kernel| dispatch(RoutingEvent::Route, c, kernel))
}

fn cmd_unroute(cli: &Cli, name: &str) -> anyhow::Result<ReturnCode> {
    with_connection(cli, name, |c, kernel| dispatch(RoutingEvent::Unroute, c, kernel))
}

fn cmd_up(cli: &Cli, name: &str) -> anyhow::Result<ReturnCode> {
    with_connection(cli, name, |c, kernel| {
        if matches!(c.routing, ike_model::RoutingState::Unrouted) {
            dispatch(RoutingEvent::Route, c, kernel)?;
        }
        dispatch(RoutingEvent::Initiate, c, kernel)?;
        dispatch(RoutingEvent::EstablishInboundChild, c, kernel)?;
        dispatch(RoutingEvent::EstablishOutboundChild, c, kernel)?;
        tracing::info!(name = %c.name, "up");
        Ok(())
    })
}

fn cmd_down(cli: &Cli, name: &str) -> anyhow::Result<ReturnCode> {
    with_connection(cli, name, |c, kernel| {
        dispatch(RoutingEvent::TeardownChild, c, kernel)?;
        tracing::info!(name = %c.name, "down");
        Ok(())
    })
}

fn cmd_initiate(cli: &Cli, name: &str, remote_host: Option<IpAddr>) -> anyhow::Result<ReturnCode> {
    let mut store = load_store(cli)?;
    let Some(serial) = find_serial(&store, name) else {
        tracing::warn!(%name, "no such connection");
        return Ok(ReturnCode::UnknownName);
    };
    let c = store.get_mut(serial).expect("serial came from this store");

    if c.never_negotiate {
        tracing::warn!(name = %c.name, "cannot initiate a never-negotiate connection");
        return Ok(ReturnCode::InitShunt);
    }

    if let Some(addr) = remote_host {
        *c = c.instantiate(Address::from(addr), ConnectionKind::Instance);
    } else if matches!(c.kind, ConnectionKind::Group | ConnectionKind::Template) {
        tracing::warn!(name = %c.name, "no suitable connection for opportunism: bare template has no peer");
        return Ok(ReturnCode::OppoFailure);
    }
    if c.remote.host.is_unset() {
        tracing::warn!(name = %c.name, "no peer address to initiate to");
        return Ok(ReturnCode::NoPeerIp);
    }

    let mut kernel = MockKernel::new();
    match dispatch(RoutingEvent::Initiate, c, &mut kernel) {
        Ok(()) => Ok(ReturnCode::Success),
        Err(ike_routing::DispatchError::Kernel(e)) => {
            tracing::warn!("kernel rejected initiate: {e}");
            Ok(ReturnCode::Route)
        }
        Err(ike_routing::DispatchError::Unoriented(e)) => {
            tracing::warn!("connection is not oriented: {e}");
            Ok(ReturnCode::Orient)
        }
        Err(ike_routing::DispatchError::RouteBusy { .. }) => {
            tracing::warn!(name = %c.name, "route busy: an active tunnel must be unrouted first");
            Ok(ReturnCode::RtBusy)
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_terminate(cli: &Cli, name: &str) -> anyhow::Result<ReturnCode> {
    with_connection(cli, name, |c, kernel| {
        if c.routing.has_kernel_policy() {
            dispatch(RoutingEvent::TeardownChild, c, kernel)?;
        }
        dispatch(RoutingEvent::TeardownIke, c, kernel)?;
        tracing::info!(name = %c.name, "terminated");
        Ok(())
    })
}

fn cmd_status(cli: &Cli) -> anyhow::Result<ReturnCode> {
    let store = load_store(cli)?;
    for c in store.iter() {
        println!("{}: {:?} ({:?})", c.name, c.routing, c.ike_version);
    }
    Ok(ReturnCode::Success)
}

fn cmd_listen(cli: &Cli) -> anyhow::Result<ReturnCode> {
    let mut store = load_store(cli)?;
    let mut kernel = MockKernel::new();
    let serials: Vec<_> = store.iter().map(|c| c.serial).collect();

    for serial in serials {
        let Some(c) = store.get_mut(serial) else { continue };
        if !matches!(c.autostart, Autostart::Add | Autostart::Ondemand | Autostart::Start | Autostart::Keep) {
            continue;
        }
        if let Err(e) = dispatch(RoutingEvent::Route, c, &mut kernel) {
            tracing::warn!(name = %c.name, "failed to route on startup: {e:#}");
            continue;
        }
        if matches!(c.autostart, Autostart::Start) {
            if let Err(e) = dispatch(RoutingEvent::Initiate, c, &mut kernel) {
                tracing::warn!(name = %c.name, "failed to initiate on startup: {e:#}");
            }
        }
    }

    for c in store.iter() {
        println!("{}: {:?}", c.name, c.routing);
    }
    Ok(ReturnCode::Success)
}

fn with_connection(
    cli: &Cli,
    name: &str,
    f: impl FnOnce(&mut ike_model::Connection, &mut dyn ike_kernel::KernelInterface) -> Result<(), ike_routing::DispatchError>,
) -> anyhow::Result<ReturnCode> {
    let mut store = load_store(cli)?;
    let Some(serial) = find_serial(&store, name) else {
        tracing::warn!(%name, "no such connection");
        return Ok(ReturnCode::UnknownName);
    };
    let mut kernel = MockKernel::new();
    let c = store.get_mut(serial).expect("serial came from this store");
    match f(c, &mut kernel) {
        Ok(()) => Ok(ReturnCode::Success),
        Err(ike_routing::DispatchError::Kernel(e)) => {
            tracing::warn!("kernel rejected operation: {e}");
            Ok(ReturnCode::Route)
        }
        Err(ike_routing::DispatchError::Unoriented(e)) => {
            tracing::warn!("connection is not oriented: {e}");
            Ok(ReturnCode::Orient)
        }
        Err(ike_routing::DispatchError::RouteBusy { .. }) => {
            tracing::warn!(%name, "route busy: an active tunnel must be unrouted first");
            Ok(ReturnCode::RtBusy)
        }
        Err(e) => Err(e.into()),
    }
}
