use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::clock::{Clock, NetworkClock, SystemClock};
use crate::crypto::{PasswordCipher, KEY_LEN};
use crate::error::ConfigurationError;

fn default_data_dir() -> PathBuf {
    PathBuf::from(env::var("EDUCORE_DATA_DIR").unwrap_or("./data".to_string()))
}

fn default_time_source() -> TimeSource {
    match env::var("EDUCORE_TIME_SOURCE").as_deref() {
        Ok("system") => TimeSource::System,
        _ => TimeSource::Network,
    }
}

fn default_time_urls() -> Vec<String> {
    vec![
        "https://www.google.com".to_string(),
        "https://www.cloudflare.com".to_string(),
        "https://www.microsoft.com".to_string(),
    ]
}

fn default_time_timeout_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSource {
    Network,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Default for DefaultAdmin {
    fn default() -> Self {
        DefaultAdmin {
            name: "Administrator".to_string(),
            email: "admin@educore.local".to_string(),
            password: "admin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Overrides the built-in password key. Must be 16 bytes.
    #[serde(default)]
    pub password_key: Option<String>,

    #[serde(default = "default_time_source")]
    pub time_source: TimeSource,
    #[serde(default = "default_time_urls")]
    pub time_urls: Vec<String>,
    #[serde(default = "default_time_timeout_ms")]
    pub time_timeout_ms: u64,

    #[serde(default)]
    pub default_admin: DefaultAdmin,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: default_data_dir(),
            password_key: None,
            time_source: default_time_source(),
            time_urls: default_time_urls(),
            time_timeout_ms: default_time_timeout_ms(),
            default_admin: DefaultAdmin::default(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    /// Reads `educored.yml` from `$CONFIG_DIR`, or defaults when absent.
    pub fn load() -> Result<Config, ConfigurationError> {
        let dir = config_dir();
        let found = ["educored.yml", "educored.yaml"]
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file());

        match found {
            Some(path) => Config::from_file(&path),
            None => {
                tracing::info!("No configuration file in '{}'; using defaults.", dir.display());
                Ok(Config::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Config, ConfigurationError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.cipher()?;
        tracing::info!("Configuration loaded from '{}'.", path.display());
        Ok(config)
    }

    pub fn cipher(&self) -> Result<PasswordCipher, ConfigurationError> {
        match &self.password_key {
            None => Ok(PasswordCipher::default()),
            Some(key) => {
                let bytes: [u8; KEY_LEN] = key
                    .as_bytes()
                    .try_into()
                    .map_err(|_| ConfigurationError::BadKeyLength(key.len()))?;
                Ok(PasswordCipher::new(&bytes))
            }
        }
    }

    pub fn clock(&self) -> Box<dyn Clock> {
        match self.time_source {
            TimeSource::System => Box::new(SystemClock),
            TimeSource::Network => Box::new(NetworkClock::new(
                self.time_urls.clone(),
                Duration::from_millis(self.time_timeout_ms),
            )),
        }
    }
}
