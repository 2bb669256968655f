//! `sleuth init`: write a default config file.

use sleuth_config::AppConfig;

pub fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    }

    if config_path.exists() && !force {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually or re-run with --force to overwrite.");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Wrote {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set your API key: export SLEUTH_API_KEY=sk-...");
    println!("     (or api_key = \"...\" in the config file)");
    println!("  2. Optionally point base_url at any OpenAI-compatible endpoint");
    println!("  3. Start chatting: sleuth chat");
    Ok(())
}
