//! Configuration loading for wabot.
//!
//! Settings live in `~/.wabot/settings.json`. Every section has defaults, so a
//! partial file (or no file at all) is valid. Environment variables, including
//! those loaded from a `.env` file, override file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub const DEFAULT_BOT_NUMBER: &str = "917034898741";
pub const DEFAULT_CLIENT_ID: &str = "whatsapp-bot";
pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:3001";
pub const DEFAULT_INSTA_API_URL: &str = "https://api.instagram-video-download-service.com/";
pub const DEFAULT_MEDIA_TOOL: &str = "yt-dlp";

/// Get the wabot home directory (~/.wabot).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".wabot"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from ~/.wabot/settings.json and apply environment overrides.
pub fn load_settings() -> Result<Settings> {
    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();

    let path = get_settings_path()?;
    let mut settings = load_settings_file(&path)?;
    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    validate_settings(&settings)?;

    Ok(settings)
}

/// Read a settings file, falling back to defaults when it does not exist.
pub fn load_settings_file(path: &Path) -> Result<Settings> {
    if !path.exists() {
        tracing::debug!("No settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Write settings as pretty JSON, creating the parent directory if needed.
pub fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    tracing::info!("Saved settings to {}", path.display());
    Ok(())
}

/// Apply environment overrides. `lookup` is `std::env::var` in production.
pub fn apply_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(number) = get("BOT_NUMBER") {
        settings.bot.number = number;
    }
    if let Some(message) = get("ALIVE_MESSAGE") {
        settings.bot.alive_message = Some(message);
    }
    if let Some(client_id) = get("WABOT_CLIENT_ID") {
        settings.bot.client_id = client_id;
    }
    if let Some(url) = get("WABOT_BRIDGE_URL") {
        settings.bridge.url = url;
    }
    if let Some(url) = get("WABOT_INSTA_API_URL") {
        settings.insta.api_url = url;
    }
    if let Some(key) = get("WABOT_INSTA_API_KEY") {
        settings.insta.api_key = Some(key);
    }
    if let Some(dir) = get("WABOT_DOWNLOAD_DIR") {
        settings.media.download_dir = Some(PathBuf::from(dir));
    }
    if let Some(max) = get("WABOT_MAX_TASKS") {
        match max.parse() {
            Ok(n) => settings.media.max_concurrent_tasks = n,
            Err(_) => tracing::warn!("Ignoring invalid WABOT_MAX_TASKS: {}", max),
        }
    }
    if let Some(timeout) = get("WABOT_TASK_TIMEOUT") {
        match timeout.parse() {
            Ok(n) => settings.media.task_timeout_secs = n,
            Err(_) => tracing::warn!("Ignoring invalid WABOT_TASK_TIMEOUT: {}", timeout),
        }
    }
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.bot.client_id.trim().is_empty() {
        return Err(Error::Config("bot.client_id must not be empty".to_string()));
    }
    let bridge = url::Url::parse(&settings.bridge.url)
        .map_err(|e| Error::Config(format!("bridge.url '{}': {}", settings.bridge.url, e)))?;
    if !matches!(bridge.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "bridge.url must be http(s), got '{}'",
            settings.bridge.url
        )));
    }
    if settings.media.max_concurrent_tasks > tokio::sync::Semaphore::MAX_PERMITS {
        return Err(Error::Config(format!(
            "media.max_concurrent_tasks must be at most {}, got {}",
            tokio::sync::Semaphore::MAX_PERMITS,
            settings.media.max_concurrent_tasks
        )));
    }
    if settings.media.task_timeout_secs == 0 {
        return Err(Error::Config(
            "media.task_timeout_secs must be greater than 0".to_string(),
        ));
    }
    if settings.ping.timeout_secs == 0 {
        return Err(Error::Config(
            "ping.timeout_secs must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Bot identity.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct BotConfig {
    pub number: String,
    /// Custom reply for `.alive`; derived from `number` when unset.
    pub alive_message: Option<String>,
    /// Identity the bridge stores credentials under.
    pub client_id: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            number: DEFAULT_BOT_NUMBER.to_string(),
            alive_message: None,
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }
}

impl BotConfig {
    /// The status string `.alive` replies with.
    pub fn alive_message(&self) -> String {
        self.alive_message.clone().unwrap_or_else(|| {
            format!("Hi, I am WhatsApp bot. My number is {}.", self.number)
        })
    }
}

/// WhatsApp bridge sidecar.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct BridgeConfig {
    pub url: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BRIDGE_URL.to_string(),
        }
    }
}

/// Instagram metadata lookup service.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct InstaConfig {
    pub api_url: String,
    pub api_key: Option<String>,
}

impl Default for InstaConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_INSTA_API_URL.to_string(),
            api_key: None,
        }
    }
}

/// Media download tool and task limits.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct MediaConfig {
    pub tool: String,
    /// Defaults to `~/.wabot/downloads`.
    pub download_dir: Option<PathBuf>,
    /// Upper bound on concurrent downloads; 0 means unbounded.
    pub max_concurrent_tasks: usize,
    pub task_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            tool: DEFAULT_MEDIA_TOOL.to_string(),
            download_dir: None,
            max_concurrent_tasks: 4,
            task_timeout_secs: 600,
        }
    }
}

impl MediaConfig {
    pub fn download_dir(&self) -> Result<PathBuf> {
        match &self.download_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(get_home_dir()?.join("downloads")),
        }
    }
}

/// Reachability probe.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct PingConfig {
    pub timeout_secs: u64,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self { timeout_secs: 5 }
    }
}

/// Root settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Settings {
    pub bot: BotConfig,
    pub bridge: BridgeConfig,
    pub insta: InstaConfig,
    pub media: MediaConfig,
    pub ping: PingConfig,
}
