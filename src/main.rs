//! RAX File Browser - Entry Point
//!
//! Serves a confined storage folder over a line-oriented TCP protocol.

use log::{error, info};
use std::process;

use rax_file_browser::server::SessionContext;
use rax_file_browser::{BrowserConfig, FileManager, LocalStorage, Server};

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    info!("Launching file browser...");

    let config = match BrowserConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let base_path = match config.storage.absolute_base_path() {
        Ok(path) => path,
        Err(e) => {
            error!("Invalid storage path {}: {}", config.storage.base_path, e);
            process::exit(1);
        }
    };

    let storage = match LocalStorage::create(&base_path, config.file.dir_permissions) {
        Ok(storage) => storage,
        Err(e) => {
            error!("Failed to prepare storage at {}: {}", base_path.display(), e);
            process::exit(1);
        }
    };

    let manager = match FileManager::new(storage, &config.file) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Invalid file name pattern: {}", e);
            process::exit(1);
        }
    };

    let context = SessionContext::from_config(&config);
    let listen_socket = config.server.listen_socket();

    let server = match Server::bind(
        &listen_socket,
        manager,
        context,
        config.server.max_clients,
    )
    .await
    {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind to {}: {}", listen_socket, e);
            process::exit(1);
        }
    };

    server.start().await;
}
