//! `zhifa doctor`: Diagnose system health.

use std::time::Duration;
use zhifa_config::AppConfig;
use zhifa_knowledge::VectorStore;

use super::CliResult;

pub async fn run() -> CliResult {
    println!("🩺 智法 Zhifa Doctor: System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults (run `zhifa onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Fix the configuration before running further checks.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured");
    } else {
        println!("  ⚠️  No API key configured (fine for local vLLM / Ollama)");
        issues += 1;
    }

    let k = &config.knowledge;
    for (label, dir) in [("Statute store", &k.legal_db_dir), ("Case store", &k.case_db_dir)] {
        match VectorStore::open(dir.clone()) {
            Ok(store) if store.is_empty() => {
                println!("  ⚠️  {label} is empty: {}", dir.display());
                issues += 1;
            }
            Ok(store) => println!("  ✅ {label}: {} passages", store.len()),
            Err(e) => {
                println!("  ❌ {label} unavailable: {e}");
                issues += 1;
            }
        }
    }

    let router = zhifa_providers::build_from_config(&config);
    match router.default() {
        Some(provider) => {
            match tokio::time::timeout(Duration::from_secs(10), provider.health_check()).await {
                Ok(Ok(true)) => println!("  ✅ Provider '{}' reachable", provider.name()),
                Ok(Ok(false)) => {
                    println!("  ❌ Provider '{}' is not healthy", provider.name());
                    issues += 1;
                }
                Ok(Err(e)) => {
                    println!("  ❌ Provider '{}' check failed: {e}", provider.name());
                    issues += 1;
                }
                Err(_) => {
                    println!("  ❌ Provider '{}' did not answer within 10s", provider.name());
                    issues += 1;
                }
            }
        }
        None => {
            println!("  ❌ No default provider configured");
            issues += 1;
        }
    }

    if config.web_search.enabled {
        println!("  ✅ Web search enabled ({})", config.web_search.endpoint);
    } else {
        println!("  ➖ Web search disabled");
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
