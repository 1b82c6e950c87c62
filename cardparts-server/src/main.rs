mod connections;
mod error;
mod listener;
mod protocol;
mod service;
mod store;

use crate::connections::Connections;
use crate::listener::WsListener;
use crate::service::GameService;
use crate::store::{RoomStore, SqliteStore, StoreWriter};
use cardparts_core::RoomRegistry;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cardparts-server")]
#[command(version, about = "WebSocket server for the card-parts trading game")]
struct Cli {
    /// Listen address
    #[arg(long, env = "CARDPARTS_ADDR", default_value = "0.0.0.0:3000")]
    addr: SocketAddr,

    /// SQLite database file for room persistence
    #[arg(long, env = "CARDPARTS_DB", default_value = "cardparts.db")]
    db: PathBuf,
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cardparts_server=debug,cardparts_core=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    let store = Arc::new(SqliteStore::open(&cli.db)?);
    let rooms = store.load_all()?;
    tracing::info!(rooms = rooms.len(), db = %cli.db.display(), "store loaded");
    let registry = RoomRegistry::restore(rooms);

    let (store_tx, store_rx) = mpsc::unbounded_channel();
    tokio::spawn(StoreWriter::new(store, store_rx).run());

    let (service_tx, service_rx) = mpsc::unbounded_channel();
    let service = GameService::new(registry, Connections::new(), store_tx, service_tx.clone());
    tokio::spawn(service.run(service_rx));

    let listener = WsListener::new(cli.addr, service_tx);
    tokio::select! {
        result = listener.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
