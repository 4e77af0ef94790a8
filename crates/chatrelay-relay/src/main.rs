//! chatrelay Relay Server
//!
//! Accepts chat clients over TCP and rebroadcasts every chunk to all other
//! clients and to the operator's monitor session on this terminal.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};

use chatrelay_core::config::load_relay_config;
use chatrelay_core::tracing_init::init_tracing;
use chatrelay_relay::{MonitorBridge, RelayLoop, bind_listener, run_monitor};

#[derive(Parser, Debug)]
#[command(name = "chatrelay-relay")]
#[command(
    version,
    about = "chatrelay relay server - broadcasts chat between clients and the local monitor"
)]
struct Args {
    /// Port to listen on.
    #[arg(short, long)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Number of client slots (overrides the config file).
    #[arg(long)]
    max_clients: Option<usize>,

    /// Path to a JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run without the monitor session on this terminal.
    #[arg(long)]
    no_monitor: bool,

    /// Reserved for nickname mode. Has no effect.
    #[arg(short = 'n', hide = true)]
    nicknames: bool,

    /// Reserved for connect/disconnect notifications. Has no effect.
    #[arg(short = 'c', hide = true)]
    notify: bool,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

/// How the relay stopped.
enum Outcome {
    Interrupted,
    Stopped,
}

async fn run(args: Args) -> anyhow::Result<Outcome> {
    let mut config =
        load_relay_config(args.config.as_deref()).context("Failed to load relay config")?;
    if let Some(max_clients) = args.max_clients {
        config.max_clients = max_clients;
        config.validate().context("Invalid --max-clients")?;
    }
    debug!(
        nicknames = args.nicknames,
        notify = args.notify,
        "Reserved flags accepted"
    );

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = bind_listener(addr, config.listen_backlog)?;

    let (relay_end, monitor_task) = if args.no_monitor {
        (None, None)
    } else {
        let (relay_end, monitor_end) = MonitorBridge::open()?.split()?;
        let task = tokio::spawn(run_monitor(
            monitor_end,
            tokio::io::stdin(),
            tokio::io::stdout(),
            config.chunk_size,
        ));
        (Some(relay_end), Some(task))
    };

    let mut relay = RelayLoop::new(listener, relay_end, &config);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %addr,
        capacity = relay.capacity(),
        "Starting chatrelay-relay"
    );

    let result = tokio::select! {
        result = relay.run() => result.map(|()| Outcome::Stopped),
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(Outcome::Interrupted)
        }
    };

    // Closing the relay's pipe ends is what tells the monitor to finish.
    drop(relay);
    if let Some(task) = monitor_task {
        match tokio::time::timeout(config.monitor_grace(), task).await {
            Ok(Ok(Ok(side))) => debug!(side = %side, "Monitor finished"),
            Ok(Ok(Err(e))) => warn!(error = %e, "Monitor failed"),
            Ok(Err(e)) => warn!(error = %e, "Monitor task panicked"),
            Err(_) => warn!("Monitor did not finish within the grace period"),
        }
    }

    info!("Relay stopped");
    Ok(result?)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing("chatrelay_relay=info", args.log_json);

    let code = match run(args).await {
        Ok(Outcome::Interrupted) => 0,
        Ok(Outcome::Stopped) => 1,
        Err(e) => {
            eprintln!("chatrelay-relay: {e:#}");
            1
        }
    };
    // Terminal reads run on a blocking thread that never returns on its own.
    std::process::exit(code)
}
