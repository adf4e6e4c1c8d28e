//! Crypto digest agent.
//!
//! A chat bot that posts a digest of the top cryptocurrencies (price and 24h change)
//! to a broadcast channel every two minutes and to every conversation that subscribed
//! with `/start`. Building blocks:
//!
//! - `DigestPipeline`: fetch rankings (`DataFetcher`), render them (`DigestFormatter`)
//!   and deliver the text (`DeliveryChannel`), falling back to a short notice for the
//!   requester when delivery fails.
//! - `JobRegistry`: at most one recurring job per destination, timers driven by a
//!   `Scheduler`.
//! - `Dispatcher`: maps `/start`, `/stop`, `/prices` and `/channel` onto the registry
//!   and the pipeline.
//! - `UpdatePoller` + `ConnectionSupervisor`: long-poll inbound commands and restart
//!   consumption after a conflict fault.
//! - `InstanceGuard`: marker file preventing two instances from polling the same bot.
//!
//! Concurrency and shutdown:
//! - The main thread runs a crossbeam `select!` over inbound events and the shutdown
//!   signal; each command is handled on its own thread.
//! - SIGINT, SIGTERM and SIGHUP trigger an ordered shutdown (jobs, stream, marker).
//!   A panic anywhere removes the marker and exits with status 1.
//!
//! Usage example (CLI):
//! ```bash
//! TELEGRAM_BOT_TOKEN=123:abc digest_agent --channel @cryptoprices254 --port 3000
//! ```
#![warn(missing_docs)]
mod args;
mod delivery;
mod dispatcher;
mod fetcher;
mod http;
mod keepalive;
pub mod model;
mod pipeline;
mod poller;
mod runtime;
mod supervisor;
mod telegram;
#[cfg(test)]
mod test_support;

use crate::args::Args;
use crate::model::instance_guard::{InstanceGuard, remove_marker};
use clap::Parser;
use crossbeam_channel::bounded;
use digest_common::{AgentError, Result};
use log::{error, info};
use std::panic;
use std::path::PathBuf;
use std::process;

fn main() -> Result<(), AgentError> {
    init_logger();
    let args = Args::parse();
    info!("Starting crypto digest agent...");

    let guard = match InstanceGuard::acquire(&args.pid_file) {
        Ok(guard) => guard,
        Err(AgentError::AlreadyRunning { pid }) => {
            error!("Another instance is already running (PID: {})", pid);
            error!("Stop the existing instance first or wait for it to finish");
            process::exit(1);
        }
        Err(e) => return Err(e),
    };
    install_panic_hook(guard.path().to_path_buf());

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        info!("Termination signal received, shutting down gracefully...");
        let _ = shutdown_tx.try_send(());
    })
    .map_err(|e| AgentError::Signal(e.to_string()))?;

    if let Err(e) = runtime::launch(&args, &guard, shutdown_rx) {
        error!("Failed to start bot: {}", e);
        return Err(e);
    }
    Ok(())
}

/// Any panic is fatal: clear the marker so a restart is not refused, then exit 1.
fn install_panic_hook(marker: PathBuf) {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        default_hook(info);
        error!("Uncaught fault: {}", info);
        if let Err(e) = remove_marker(&marker) {
            error!("Failed to remove {}: {}", marker.display(), e);
        }
        process::exit(1);
    }));
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
