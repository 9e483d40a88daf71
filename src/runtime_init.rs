//! Server bootstrap for `serve` and `helper-manager`.

use std::error::Error;

use tokio::sync::watch;
use tracing::{info, warn};

use ime_bridge::config::{BridgeConfig, FileConfig};
use ime_bridge::engine::{BackEnd, EchoFactory};
use ime_bridge::frontend::{FrontEndSettings, SocketFrontEnd};
use ime_bridge::helper::{HelperManager, HelperRegistry};
use ime_bridge::ipc::{Address, ConnectionServer, ServerHandler};

/// Engine factories compiled into the binary.
pub fn build_backend() -> Result<BackEnd, Box<dyn Error>> {
    let mut backend = BackEnd::new();
    backend.register_factory(std::sync::Arc::new(EchoFactory::new()))?;
    Ok(backend)
}

/// Run the SocketFrontEnd until Ctrl-C, or until the last client leaves
/// when the frontend is not resident.
pub async fn run_frontend(config: &BridgeConfig) -> Result<(), Box<dyn Error>> {
    let store = FileConfig::open(&config.store_path)?;
    let backend = build_backend()?;
    info!(
        store = %config.store_path.display(),
        factories = backend.len(),
        stay_resident = config.stay_resident,
        "Starting socket frontend"
    );
    let frontend = SocketFrontEnd::new(backend, Box::new(store), FrontEndSettings::from(config));
    serve(&config.frontend_address()?, config, frontend).await
}

/// Run the HelperManager until Ctrl-C.
pub async fn run_helper_manager(config: &BridgeConfig) -> Result<(), Box<dyn Error>> {
    let registry = HelperRegistry::load_dir(&config.helper_dir)?;
    info!(dir = %config.helper_dir.display(), helpers = registry.len(), "Starting helper manager");
    let manager = HelperManager::new(registry, config.display.clone());
    serve(&config.helper_manager_address()?, config, manager).await
}

async fn serve<H>(address: &Address, config: &BridgeConfig, mut handler: H) -> Result<(), Box<dyn Error>>
where
    H: ServerHandler + 'static,
{
    let server = ConnectionServer::bind(address, config.server_config()).await?;
    eprintln!("Listening on {}", server.local_address());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server_handle = tokio::spawn(async move { server.run(&mut handler, shutdown_rx).await });

    tokio::select! {
        finished = &mut server_handle => {
            finished??;
            info!("Server stopped");
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for Ctrl-C, stopping");
            }
            eprintln!("Shutdown signal received, stopping...");
        }
    }

    let _ = shutdown_tx.send(true);
    server_handle.await??;
    eprintln!("Shutdown complete");
    Ok(())
}
