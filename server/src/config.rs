use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use base64::{prelude::BASE64_STANDARD, Engine};
use clap::Parser;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tower_cookies::Key;

/// Share short-lived text snippets.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// HTTP network address
    #[arg(long, default_value = "0.0.0.0:4000")]
    pub addr: SocketAddr,

    /// PostgreSQL data source name
    #[arg(long, env = "DATABASE_URL")]
    pub dsn: String,

    /// Path of the TOML config file, created with a fresh secret if missing
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    #[error("cookie_secret is not valid base64: {0}")]
    SecretEncoding(#[from] base64::DecodeError),

    #[error("cookie_secret must decode to at least 64 bytes")]
    SecretTooShort,
}

pub const COOKIE_SECRET_LEN: usize = 64;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base64 key for encrypting and signing the session cookie
    pub cookie_secret: String,
    /// Mark the session cookie `Secure`. Only enable behind HTTPS, browsers
    /// do not send such cookies over plain HTTP.
    pub secure_cookies: bool,
    pub session_lifetime_hours: i64,
    pub read_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cookie_secret: String::new(),
            secure_cookies: false,
            session_lifetime_hours: 12,
            read_timeout_secs: 5,
            request_timeout_secs: 10,
            static_dir: PathBuf::from("ui/static"),
        }
    }
}

impl Config {
    pub fn load_config(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&config_str)?)
    }

    /// Loads `path`, or writes a new config with a random secret there when the
    /// file does not exist.
    pub fn load_or_generate(path: &Path) -> Result<Self, ConfigError> {
        match Self::load_config(path) {
            Err(ConfigError::IoError(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("GENERATING CONFIG FILE WITH SECRET at {}", path.display());

                let mut secret = [0u8; COOKIE_SECRET_LEN];
                rand::thread_rng().fill(&mut secret[..]);

                let config = Config {
                    cookie_secret: BASE64_STANDARD.encode(secret),
                    ..Default::default()
                };

                std::fs::write(path, toml::to_string(&config)?)?;

                Ok(config)
            }
            result => result,
        }
    }

    pub fn cookies_secret(&self) -> Result<Key, ConfigError> {
        let secret = BASE64_STANDARD.decode(self.cookie_secret.trim())?;
        if secret.len() < COOKIE_SECRET_LEN {
            return Err(ConfigError::SecretTooShort);
        }
        Key::try_from(secret.as_slice()).map_err(|_| ConfigError::SecretTooShort)
    }

    pub fn session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_lifetime_hours)
    }

    pub fn read_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.read_timeout_secs)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}
