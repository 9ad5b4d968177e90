use std::process::ExitCode;

use tracing::{error, info, warn};

use mycloud::admin::ensure_admin;
use mycloud::web::WebServer;
use mycloud::{Config, Database};

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = mycloud::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        mycloud::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    info!("MyCloud {}", env!("CARGO_PKG_VERSION"));

    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match ensure_admin(db.pool(), &config.admin).await {
        Ok(Some(admin)) => info!(username = %admin.username, "Administrator account ready"),
        Ok(None) => info!("No administrator password configured, skipping bootstrap"),
        Err(e) => warn!("Administrator bootstrap failed: {}", e),
    }

    let server = match WebServer::new(&config, db) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to set up web server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Web server error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
