use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR: &str = "mangaverse";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub uploads_base_url: String,
    pub user_agent: String,
    pub page_size: usize,
    pub search_limit: usize,
    pub search_min_chars: usize,
    pub search_debounce_ms: u64,
    pub translated_language: String,
    pub language_priority: Vec<String>,
    pub content_ratings: Vec<String>,
    pub data_saver: bool,
    pub retry_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub home_revalidate_secs: u64,
    pub proxy_listen: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.mangadex.org".to_string(),
            uploads_base_url: "https://uploads.mangadex.org".to_string(),
            user_agent: format!("mangaverse/{}", env!("CARGO_PKG_VERSION")),
            page_size: 20,
            search_limit: 10,
            search_min_chars: 2,
            search_debounce_ms: 500,
            translated_language: "en".to_string(),
            language_priority: ["en", "ja-ro", "ja", "ko-ro", "ko", "zh-hk", "zh"]
                .into_iter()
                .map(String::from)
                .collect(),
            content_ratings: ["safe", "suggestive", "erotica"]
                .into_iter()
                .map(String::from)
                .collect(),
            data_saver: false,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            home_revalidate_secs: 3600,
            proxy_listen: "127.0.0.1:8787".to_string(),
        }
    }
}

impl Settings {
    /// Reads settings from `path`, or the default config location.
    /// A missing or broken file yields defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

        if !path.exists() {
            return Settings::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("ignoring unreadable config {}: {}", path.display(), e);
                    Settings::default()
                }
            },
            Err(e) => {
                warn!("could not read config {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }

    pub fn language_priority(&self) -> Vec<&str> {
        self.language_priority.iter().map(String::as_str).collect()
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn home_revalidate(&self) -> Duration {
        Duration::from_secs(self.home_revalidate_secs)
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_config_path() -> PathBuf {
    config_dir().join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "page_size": 40, "data_saver": true }"#).unwrap();
        assert_eq!(settings.page_size, 40);
        assert!(settings.data_saver);
        assert_eq!(settings.api_base_url, "https://api.mangadex.org");
        assert_eq!(settings.language_priority()[0], "en");
        assert_eq!(settings.retry_attempts, 3);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("mangaverse-does-not-exist.json");
        let settings = Settings::load(Some(&path));
        assert_eq!(settings.page_size, 20);
        assert_eq!(settings.search_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn broken_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!(
            "mangaverse-broken-{}.json",
            std::process::id()
        ));
        fs::write(&path, "{ not json").unwrap();
        let settings = Settings::load(Some(&path));
        assert_eq!(settings.proxy_listen, "127.0.0.1:8787");
        fs::remove_file(&path).ok();
    }
}
