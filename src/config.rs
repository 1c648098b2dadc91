use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::types::{PeerAddress, UserInfo};

pub const DEFAULT_CONFIG_PATH: &str = "config/peerchat.json";

const DEFAULT_KEEP_ALIVE_SECS: u64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Port of the chat RPC endpoint.
    #[serde(default = "default_chat_port")]
    pub chat_port: u16,
    /// Port of the presence rendezvous endpoint.
    #[serde(default = "default_presence_port")]
    pub presence_port: u16,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_chat_port() -> u16 {
    9900
}

fn default_presence_port() -> u16 {
    9901
}

fn default_keep_alive_secs() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            chat_port: default_chat_port(),
            presence_port: default_presence_port(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl AppConfig {
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn chat_address(&self) -> PeerAddress {
        PeerAddress::new(self.host.clone(), self.chat_port)
    }

    pub fn presence_address(&self) -> PeerAddress {
        PeerAddress::new(self.host.clone(), self.presence_port)
    }

    /// Identity announced on the presence rendezvous.
    pub fn local_user(&self) -> UserInfo {
        UserInfo {
            id: self.chat_address(),
            presence_endpoint: self.presence_address(),
            keep_alive_interval: self.keep_alive_interval(),
        }
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config("does/not/exist.json");
        assert_eq!(config.keep_alive_secs, DEFAULT_KEEP_ALIVE_SECS);
        assert_eq!(config.local_user().id, config.chat_address());
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "host": "192.168.1.20", "keep_alive_secs": 5 }"#).unwrap();
        assert_eq!(config.host, "192.168.1.20");
        assert_eq!(config.keep_alive_interval(), Duration::from_secs(5));
        assert_eq!(config.chat_port, default_chat_port());
    }
}
