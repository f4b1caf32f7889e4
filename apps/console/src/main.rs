mod commands;
mod session;

use std::io::BufRead;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use bridge_core::BridgeConfig;
use car_link::{LinkConfig, LinkTransport};
use clap::Parser;
use crossbeam_channel::{select, Receiver};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use commands::HELP;
use session::{ConsoleSession, Flow};

#[derive(Parser, Debug)]
#[command(name = "car-console", version, about = "Operator console for the remote car")]
struct Cli {
    /// Vehicle address.
    #[arg(long, default_value = "127.0.0.1:5000")]
    addr: String,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log: String,

    /// Wait for `connect` instead of connecting at startup.
    #[arg(long = "no-connect")]
    no_connect: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log)))
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start tokio runtime")?;

    let (tx, rx) = bridge_core::channel();
    let link = Arc::new(LinkTransport::new(LinkConfig::default(), runtime.handle().clone(), tx));
    let mut session = ConsoleSession::new(BridgeConfig::from_env(), link, rx, cli.addr);
    info!("console ready");
    println!("{HELP}");

    if !cli.no_connect {
        session.apply(commands::Action::Connect(None));
    }
    session.render();

    let lines = spawn_stdin_reader();
    loop {
        select! {
            recv(session.inbound()) -> event => match event {
                Ok(event) => session.handle(event),
                Err(_) => break,
            },
            recv(lines) -> line => match line {
                Ok(line) => match commands::parse(&line) {
                    Ok(action) => {
                        if session.apply(action) == Flow::Quit {
                            break;
                        }
                    }
                    Err(msg) => println!("! {msg}"),
                },
                Err(_) => {
                    debug!("stdin closed");
                    break;
                }
            },
        }
        session.render();
    }

    session.shutdown();
    runtime.shutdown_timeout(std::time::Duration::from_millis(500));
    Ok(())
}

/// Blocking stdin reads live on their own thread; lines arrive on the
/// returned channel until EOF.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
