use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trpc_tester_core::Tester;
use trpc_tester_server::{HostSettings, JsonFileStore, ReqwestTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = HostSettings::from_env();
    init_tracing(settings.json_logs);

    let transport = Arc::new(ReqwestTransport::new()?);
    let store = Arc::new(JsonFileStore::new(settings.config_path.clone()));
    let tester = Arc::new(Tester::new(transport, store));

    let addr = settings.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, config = %settings.config_path.display(), "tRPC tester listening");
    trpc_tester_server::run(listener, tester).await?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
