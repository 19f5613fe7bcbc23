//! `tentacool serve` — Start the HTTP API server.

use tentacool_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.server.port = port;
    }

    println!("🐙 TentaCool Gateway");
    println!("   Listening: {}:{}", config.server.host, config.server.port);
    println!("   Model: {}", config.model.model);
    println!("   Database: {}", config.database.url);

    tentacool_gateway::start(config).await?;

    Ok(())
}
