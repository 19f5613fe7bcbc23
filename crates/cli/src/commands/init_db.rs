//! `tentacool init-db` — Create the SQLite database and run migrations.

use tentacool_config::AppConfig;
use tentacool_store::SqliteStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🐙 Initializing database at {}", config.database.url);
    SqliteStore::new(&config.database.url).await?;
    println!("   ✅ Schema up to date");

    Ok(())
}
