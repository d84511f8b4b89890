//! Handoff relay daemon

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use handoff_server::args::Args;
use handoff_server::constants::*;
use handoff_server::gateway::{Gateway, GatewayConfig};
use handoff_server::logging;
use handoff_server::offers::{self, OfferRegistry, TransferConfig};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init(args.debug);

    // Print banner first
    println!("{}{}", MSG_BANNER, env!("CARGO_PKG_VERSION"));

    if args.workers == 0 {
        eprintln!("{}", ERR_WORKERS);
        process::exit(1);
    }

    let upload_dir = setup_upload_dir(args.upload_dir()).await;

    let mut config = GatewayConfig::new(upload_dir);
    config.peer_host = args.peer_host;
    config.workers = args.workers;
    config.max_upload_size = args.max_upload_size;
    config.transfer = TransferConfig {
        bind: args.transfer_bind,
        accept_timeout: args.offer_timeout(),
    };

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("{}{}: {}", ERR_BIND, addr, e);
            process::exit(1);
        }
    };
    println!("{}{}", MSG_LISTENING, addr);
    println!("{}{}", MSG_TRANSFER_BIND, config.transfer.bind);
    if let Some(timeout) = config.transfer.accept_timeout {
        println!("{}{}", MSG_OFFER_TIMEOUT, timeout.as_secs());
    }

    let registry = Arc::new(OfferRegistry::new());
    let gateway = Arc::new(Gateway::new(config, Arc::clone(&registry)));

    tokio::select! {
        _ = setup_shutdown_signal() => {
            println!("{}", MSG_SHUTDOWN_RECEIVED);
        }
        _ = Arc::clone(&gateway).serve(listener) => {}
    }

    // Offers die with the process; remove what nobody claimed
    let discarded = offers::discard_all(&registry).await;
    println!("{}{}", MSG_OFFERS_DISCARDED, discarded);
}

/// Create the upload directory, exiting on failure
async fn setup_upload_dir(dir: PathBuf) -> PathBuf {
    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
        eprintln!("{}{}: {}", ERR_CREATE_UPLOAD_DIR, dir.display(), e);
        process::exit(1);
    }
    println!("{}{}", MSG_UPLOAD_DIR, dir.display());
    dir
}

/// Wait for a shutdown signal (SIGTERM or SIGINT on Unix, Ctrl-C elsewhere)
async fn setup_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).expect(ERR_SIGNAL_SIGTERM);
        let mut sigint = signal(SignalKind::interrupt()).expect(ERR_SIGNAL_SIGINT);

        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect(ERR_SIGNAL_CTRLC);
    }
}
