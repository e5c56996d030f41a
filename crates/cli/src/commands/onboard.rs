//! `zhifa onboard`: First-time setup.

use zhifa_config::AppConfig;

use super::CliResult;

pub async fn run() -> CliResult {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let defaults = AppConfig::default();

    println!("⚖️  智法 Zhifa: First-Time Setup");
    println!("================================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    for dir in [&defaults.knowledge.legal_db_dir, &defaults.knowledge.case_db_dir] {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created store directory: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Edit {} and set the provider and API key", config_path.display());
        println!("   2. Run: zhifa index --kind legal --source <statute dir>");
        println!("   3. Run: zhifa index --kind case --source <case dir>");
        println!("   4. Run: zhifa ask\n");
    }

    println!("🎉 Setup complete!\n");
    Ok(())
}
