//! chatrelay Client
//!
//! Connects to a chat relay and bridges the terminal with it: typed lines go
//! to the relay, relayed chat is printed.

use clap::{ArgAction, Parser};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use chatrelay_cli::connection::connect;
use chatrelay_cli::session::{greet, run_session};
use chatrelay_core::ClientConfig;
use chatrelay_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "chatrelay")]
#[command(version, about = "Chat with a chatrelay relay from the terminal", long_about = None)]
#[command(disable_help_flag = true)]
struct Cli {
    /// Relay host name or address.
    #[arg(short = 'h', long, default_value = "localhost")]
    host: String,

    /// Relay port.
    #[arg(short, long)]
    port: u16,

    /// Nickname. Accepted for compatibility; not sent.
    #[arg(short, long)]
    nickname: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,

    /// Print help.
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

/// How the session stopped.
enum Outcome {
    Interrupted,
    HungUp,
}

async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    if let Some(nickname) = &cli.nickname {
        debug!(nickname, "Nickname ignored");
    }
    let config = ClientConfig::new(cli.host, cli.port);

    let stream = connect(&config).await?;
    let mut stdout = tokio::io::stdout();
    greet(&mut stdout, &config).await?;

    tokio::select! {
        result = run_session(stream, tokio::io::stdin(), &mut stdout, config.chunk_size) => {
            let side = result?;
            info!(side = %side, "Session ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            return Ok(Outcome::Interrupted);
        }
    }

    stdout.write_all(b"hanging up\n").await?;
    stdout.flush().await?;
    Ok(Outcome::HungUp)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing("chatrelay=warn", cli.log_json);

    let code = match run(cli).await {
        Ok(Outcome::Interrupted) => 0,
        Ok(Outcome::HungUp) => 1,
        Err(e) => {
            eprintln!("chatrelay: {e:#}");
            1
        }
    };
    // Terminal reads run on a blocking thread that never returns on its own.
    std::process::exit(code)
}
