//! SMTP and Kindle settings
//!
//! Settings are plain `KEY=value` pairs. They are merged from, lowest
//! precedence first:
//!
//! 1. `./.env` in the working directory
//! 2. `~/.kindle-wikipedia-cli.env` (or the file given with `--config`)
//! 3. the process environment
//!
//! Files are read without touching the process environment.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use lettre::Address;
use tracing::debug;

use crate::error::ConfigError;

/// Env file looked up in the home directory when `--config` is not given.
pub const DEFAULT_ENV_FILE: &str = ".kindle-wikipedia-cli.env";

pub const DEFAULT_SMTP_PORT: u16 = 587;

const SMTP_HOST: &str = "SMTP_HOST";
const SMTP_PORT: &str = "SMTP_PORT";
const SMTP_USER: &str = "SMTP_USER";
const SMTP_PASSWORD: &str = "SMTP_PASSWORD";
const SMTP_FROM: &str = "SMTP_FROM";
const KINDLE_EMAIL: &str = "KINDLE_EMAIL";

const KEYS: &[&str] = &[
    SMTP_HOST,
    SMTP_PORT,
    SMTP_USER,
    SMTP_PASSWORD,
    SMTP_FROM,
    KINDLE_EMAIL,
];

/// Validated settings, loaded once at startup.
#[derive(Clone, PartialEq)]
pub struct Config {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    /// `From:` address; `SMTP_FROM`, or `SMTP_USER` when unset
    pub sender: Address,
    /// Send-to-Kindle address
    pub kindle_email: Address,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field("smtp_password", &"<redacted>")
            .field("sender", &self.sender)
            .field("kindle_email", &self.kindle_email)
            .finish()
    }
}

impl Config {
    /// Load and validate settings from every source.
    ///
    /// `explicit` replaces the home-directory env file; unlike the default
    /// file it must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (file, required) = match explicit {
            Some(path) => (Some(expand_tilde_path(path)), true),
            None => (default_config_path(), false),
        };
        Self::load_from(Path::new(".env"), file.as_deref(), required, |key| {
            std::env::var(key).ok()
        })
    }

    /// Merge `cwd_env`, then `file`, then whatever `env` returns for each
    /// known key, and validate the result.
    pub fn load_from(
        cwd_env: &Path,
        file: Option<&Path>,
        file_required: bool,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();

        read_env_file(cwd_env, false, &mut values)?;
        if let Some(path) = file {
            read_env_file(path, file_required, &mut values)?;
        }

        for key in KEYS {
            if let Some(value) = env(key) {
                values.insert((*key).to_string(), value);
            }
        }

        Self::from_values(&values)
    }

    /// Build a config from already-merged key/value pairs.
    pub fn from_values(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            values
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<String> = [SMTP_HOST, SMTP_USER, SMTP_PASSWORD, KINDLE_EMAIL]
            .into_iter()
            .filter(|&key| get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let smtp_port = match get(SMTP_PORT) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(port) if port != 0 => port,
                _ => return Err(ConfigError::InvalidPort(raw.to_string())),
            },
            None => DEFAULT_SMTP_PORT,
        };

        let smtp_user = get(SMTP_USER).unwrap_or_default().to_string();
        let sender = match get(SMTP_FROM) {
            Some(from) => parse_address(SMTP_FROM, from)?,
            None => parse_address(SMTP_USER, &smtp_user)?,
        };
        let kindle_email = parse_address(KINDLE_EMAIL, get(KINDLE_EMAIL).unwrap_or_default())?;

        Ok(Config {
            smtp_host: get(SMTP_HOST).unwrap_or_default().to_string(),
            smtp_port,
            smtp_password: values.get(SMTP_PASSWORD).cloned().unwrap_or_default(),
            smtp_user,
            sender,
            kindle_email,
        })
    }
}

fn parse_address(key: &'static str, value: &str) -> Result<Address, ConfigError> {
    value
        .parse::<Address>()
        .map_err(|source| ConfigError::InvalidAddress {
            key,
            value: value.to_string(),
            source,
        })
}

/// Merge the pairs of one env file into `values`, overriding earlier ones.
fn read_env_file(
    path: &Path,
    required: bool,
    values: &mut HashMap<String, String>,
) -> Result<(), ConfigError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(err) if err.not_found() => {
            if required {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            debug!(path = %path.display(), "env file not present");
            return Ok(());
        }
        Err(source) => {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    for item in iter {
        let (key, value) = item.map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        values.insert(key, value);
    }

    debug!(path = %path.display(), "loaded env file");
    Ok(())
}

/// `~/.kindle-wikipedia-cli.env`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    home_dir().map(|home| home.join(DEFAULT_ENV_FILE))
}

/// Replace a leading `~` with the home directory.
pub fn expand_tilde_path(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}
