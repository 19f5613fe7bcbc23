//! `tentacool doctor` — Diagnose configuration and connectivity.

use tentacool_config::AppConfig;
use tentacool_store::SqliteStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 TentaCool Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue found. See above for details.");
            return Ok(());
        }
    };

    match config.require_secrets() {
        Ok(()) => println!("  ✅ Secrets configured"),
        Err(e) => {
            println!("  ⚠️  {e}");
            issues += 1;
        }
    }

    match SqliteStore::new(&config.database.url).await {
        Ok(_) => println!("  ✅ Database reachable ({})", config.database.url),
        Err(e) => {
            println!("  ❌ Database unreachable: {e}");
            issues += 1;
        }
    }

    match tentacool_providers::build_from_config(&config) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Model API reachable ({})", config.model.model),
            Ok(false) | Err(_) => {
                println!("  ⚠️  Model API not responding — check base_url and api_key");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ⚠️  Provider not configured: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
