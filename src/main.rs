use std::sync::Arc;

use tracing::{error, info};

use game_hangar::storage::S3ObjectStore;
use game_hangar::{AppState, Config, Database, PolicyEngine, WebServer};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal: {}", e);
        eprintln!("game-hangar: {e}");
        std::process::exit(1);
    }
}

async fn run() -> game_hangar::Result<()> {
    let config = Config::from_env()?;

    if let Err(e) = game_hangar::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        game_hangar::logging::init_console_only(&config.logging.level);
    }
    info!("Game Hangar starting on {}", config.bind_address());

    let db = Database::connect(&config.database).await?;
    if let Some(version) = db.migrate(&config.database.migrate).await? {
        info!(version, "Database schema is up to date");
    }

    let objects = Arc::new(S3ObjectStore::connect(&config.storage).await?);
    let policy = Arc::new(PolicyEngine::load(Arc::new(db.clone())).await?);
    let state = Arc::new(AppState::new(Arc::new(db), policy, objects));

    WebServer::new(&config.server, state)?.run().await
}
