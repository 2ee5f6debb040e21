use anyhow::{Context, Result};
use eaconsole_api_client::{ApiClient, RequestTimeouts};
use eaconsole_runtime_config::{CONFIG_FILE_NAME, ConsoleConfig, apply_fallbacks};
use std::path::{Path, PathBuf};

/// Get the config directory path (~/.config/eaconsole/)
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("eaconsole"))
}

/// Canonical config file path.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load config from `path`, returning defaults if the file does not exist.
pub fn load_config(path: &Path) -> Result<ConsoleConfig> {
    if !path.exists() {
        return Ok(ConsoleConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let mut config: ConsoleConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;
    apply_fallbacks(&mut config);
    Ok(config)
}

pub fn save_config(path: &Path, config: &ConsoleConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config dir at {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config at {}", path.display()))?;
    Ok(())
}

/// Locate and load the config file, then apply command-line overrides.
pub fn resolve(path: Option<PathBuf>, server: Option<String>) -> Result<(PathBuf, ConsoleConfig)> {
    let path = match path {
        Some(path) => path,
        None => config_path()?,
    };
    let mut config = load_config(&path)?;
    if let Some(url) = server {
        config.server.url = url;
    }
    Ok((path, config))
}

pub fn request_timeouts(config: &ConsoleConfig) -> RequestTimeouts {
    RequestTimeouts {
        poll: config.poll.request_timeout(),
        bootstrap: config.poll.bootstrap_timeout(),
        mutation: config.poll.mutation_timeout(),
    }
}

pub fn build_client(config: &ConsoleConfig) -> Result<ApiClient> {
    ApiClient::new(&config.server.url, request_timeouts(config))
        .with_context(|| format!("Failed to create HTTP client for {}", config.server.url))
}

/// Print the effective config.
pub fn show_config(path: &Path, config: &ConsoleConfig) -> Result<()> {
    println!("Config file: {}", path.display());
    println!();
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    print!("{content}");
    Ok(())
}
