//! Settings resolution
//!
//! Every setting is looked up in order: command line flag, environment variable, `config.toml`,
//! built-in default. The config file lives in the directory named by `CIVITAI_CONFIG_DIR` or, when
//! unset, in the platform config directory (`$XDG_CONFIG_HOME/civitai-downloader` on Linux,
//! `%APPDATA%\civitai-downloader` on Windows).
//!
//! ```toml
//! api_key = "0123456789abcdef"
//! cookies = "/home/me/.civitai-cookies.json"
//! output = "/data/civitai"
//! simultaneous_downloads = 4
//! ```
use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::download::MAX_SIMULTANEOUS_DOWNLOADS;

pub const CONFIG_DIR_ENV: &str = "CIVITAI_CONFIG_DIR";

const CONFIG_FILE_NAME: &str = "config.toml";
const COOKIES_FILE_NAME: &str = "cookies.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No API key given. Pass --api-key, set CIVITAI_API_KEY or add api_key to config.toml")]
    MissingApiKey,

    #[error("Failed to access config file: {source}")]
    ConfigIO {
        #[from]
        source: io::Error,
    },

    #[error("Failed to parse config file: {source}")]
    ConfigParse {
        #[from]
        source: toml::de::Error,
    },

    #[error("Could not determine a config directory for this platform. Set CIVITAI_CONFIG_DIR instead")]
    NoConfigDir,
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub api_key: Option<String>,
    pub cookies: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub simultaneous_downloads: Option<u8>,
}

impl ConfigFile {
    /// Reads `path`, returning the defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                debug!("Loading config from {}", path.display());
                Self::parse(&contents)
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("No config file at {}", path.display());
                Ok(Self::default())
            }
            Err(error) => Err(error.into()),
        }
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}

/// Returns the config directory, creating it when missing.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let path = match env::var_os(CONFIG_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => ProjectDirs::from("com", "civitai-downloader", "civitai-downloader")
            .ok_or(ConfigError::NoConfigDir)?
            .config_dir()
            .to_path_buf(),
    };

    if !path.exists() {
        debug!("Creating config dir {}", path.display());
        fs::create_dir_all(&path)?;
    }

    Ok(path)
}

/// Values given on the command line (or through their environment variables).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub cookies: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub simultaneous_downloads: Option<u8>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    api_key: Option<String>,
    pub cookies: PathBuf,
    pub output_dir: PathBuf,
    pub simultaneous_downloads: u8,
}

impl Settings {
    /// Loads `config.toml` from the config directory and merges it under `overrides`.
    pub fn load(overrides: Overrides) -> Result<Self, ConfigError> {
        let dir = config_dir()?;
        let file = ConfigFile::load(&dir.join(CONFIG_FILE_NAME))?;
        Ok(Self::resolve(overrides, file, &dir))
    }

    pub fn resolve(overrides: Overrides, file: ConfigFile, config_dir: &Path) -> Self {
        let api_key = overrides
            .api_key
            .or(file.api_key)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Self {
            api_key,
            cookies: overrides
                .cookies
                .or(file.cookies)
                .unwrap_or_else(|| config_dir.join(COOKIES_FILE_NAME)),
            output_dir: overrides
                .output
                .or(file.output)
                .unwrap_or_else(|| PathBuf::from(".")),
            simultaneous_downloads: overrides
                .simultaneous_downloads
                .or(file.simultaneous_downloads)
                .unwrap_or(1)
                .clamp(1, MAX_SIMULTANEOUS_DOWNLOADS),
        }
    }

    /// The API key, required by every command that talks to the server.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }
}
