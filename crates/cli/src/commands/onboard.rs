//! `toolloop onboard`: first-time setup.

use std::path::Path;

use toolloop_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = super::config_path(config_path);

    println!("toolloop: first-time setup");
    println!("==========================\n");

    if let Some(config_dir) = config_path.parent()
        && !config_dir.as_os_str().is_empty()
        && !config_dir.exists()
    {
        std::fs::create_dir_all(config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Add your model API key under [model] (or set GOOGLE_API_KEY)");
    println!("   2. Add tool keys under [tools.weather] and [tools.stock]");
    println!("      (or set OPENWEATHER_API_KEY and ALPHAVANTAGE_API_KEY)");
    println!("   3. Run: toolloop ask \"What is 12 * 7?\"\n");

    Ok(())
}
