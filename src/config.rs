//! Application settings.
//!
//! Settings come from an optional TOML file, then environment overrides:
//!
//! ```toml
//! home = "/home/alice/.pipe"
//!
//! [registry]
//! url = "https://registry.internal"
//! token = "..."
//! timeout_secs = 30
//! ```
//!
//! | variable               | overrides          |
//! |------------------------|--------------------|
//! | `PIPEHUB_HOME`         | `home`             |
//! | `PIPEHUB_REGISTRY_URL` | `registry.url`     |
//! | `PIPEHUB_TOKEN`        | `registry.token`   |

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hub::StoreConfig;
use crate::registry::{HttpRegistry, RegistryError};

pub const HOME_ENV: &str = "PIPEHUB_HOME";
pub const REGISTRY_URL_ENV: &str = "PIPEHUB_REGISTRY_URL";
pub const TOKEN_ENV: &str = "PIPEHUB_TOKEN";

const CONFIG_FILE: &str = "config.toml";
const DEFAULT_HOME_DIR: &str = ".pipe";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot determine home directory; set PIPEHUB_HOME")]
    NoHome,

    #[error("no registry configured; set PIPEHUB_REGISTRY_URL or [registry] url")]
    MissingRegistryUrl,

    #[error("registry client: {0}")]
    Registry(#[from] RegistryError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// `[registry]` table of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Shape of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    home: Option<PathBuf>,
    registry: RegistrySettings,
}

/// Resolved application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of everything pipehub keeps on disk.
    pub home: PathBuf,
    pub registry: RegistrySettings,
}

impl Settings {
    /// Load settings from `config_path` (or `<home>/config.toml`) and the
    /// process environment.
    pub fn load(config_path: Option<&Path>) -> ConfigResult<Self> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Load settings with an explicit environment lookup.
    pub fn load_with(
        config_path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        let env_home = env(HOME_ENV).filter(|v| !v.is_empty()).map(PathBuf::from);
        let default_home = match &env_home {
            Some(home) => home.clone(),
            None => dirs::home_dir()
                .ok_or(ConfigError::NoHome)?
                .join(DEFAULT_HOME_DIR),
        };

        let (path, required) = match config_path {
            Some(path) => (path.to_path_buf(), true),
            None => (default_home.join(CONFIG_FILE), false),
        };
        let file = read_config_file(&path, required)?.unwrap_or_default();

        let mut settings = Settings {
            home: env_home.or(file.home).unwrap_or(default_home),
            registry: file.registry,
        };
        if let Some(url) = env(REGISTRY_URL_ENV).filter(|v| !v.is_empty()) {
            settings.registry.url = Some(url);
        }
        if let Some(token) = env(TOKEN_ENV).filter(|v| !v.is_empty()) {
            settings.registry.token = Some(token);
        }
        Ok(settings)
    }

    /// Directory of the hub store.
    pub fn hub_dir(&self) -> PathBuf {
        self.home.join("hub")
    }

    /// Directory of local pipeline files.
    pub fn files_dir(&self) -> PathBuf {
        self.home.join("files")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.registry.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.hub_dir())
    }

    /// Build the HTTP registry client.
    pub fn http_registry(&self) -> ConfigResult<HttpRegistry> {
        let url = self
            .registry
            .url
            .as_deref()
            .ok_or(ConfigError::MissingRegistryUrl)?;
        Ok(HttpRegistry::new(
            url,
            self.registry.token.clone(),
            self.timeout(),
        )?)
    }
}

fn read_config_file(path: &Path, required: bool) -> ConfigResult<Option<ConfigFile>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound && !required => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str(&raw)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_home_env() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("pipe");
        let env = env_of(&[(HOME_ENV, home.to_str().unwrap())]);

        let settings = Settings::load_with(None, env).unwrap();
        assert_eq!(settings.home, home);
        assert_eq!(settings.hub_dir(), home.join("hub"));
        assert_eq!(settings.files_dir(), home.join("files"));
        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert!(matches!(
            settings.http_registry(),
            Err(ConfigError::MissingRegistryUrl)
        ));
    }

    #[test]
    fn test_file_then_env_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(
            &path,
            r#"
home = "/srv/pipe"

[registry]
url = "http://file.example"
token = "from-file"
timeout_secs = 5
"#,
        )
        .unwrap();

        let settings = Settings::load_with(Some(&path), env_of(&[])).unwrap();
        assert_eq!(settings.home, PathBuf::from("/srv/pipe"));
        assert_eq!(settings.registry.url.as_deref(), Some("http://file.example"));
        assert_eq!(settings.timeout(), Duration::from_secs(5));
        assert!(settings.http_registry().is_ok());

        let env = env_of(&[
            (REGISTRY_URL_ENV, "http://env.example"),
            (TOKEN_ENV, "from-env"),
        ]);
        let settings = Settings::load_with(Some(&path), env).unwrap();
        assert_eq!(settings.registry.url.as_deref(), Some("http://env.example"));
        assert_eq!(settings.registry.token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_default_config_file_is_read_from_home() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[registry]\nurl = \"http://home.example\"\n",
        )
        .unwrap();
        let env = env_of(&[(HOME_ENV, dir.path().to_str().unwrap())]);

        let settings = Settings::load_with(None, env).unwrap();
        assert_eq!(settings.registry.url.as_deref(), Some("http://home.example"));
    }

    #[test]
    fn test_explicit_config_must_exist_and_parse() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Settings::load_with(Some(&missing), env_of(&[])),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "registry = [").unwrap();
        assert!(matches!(
            Settings::load_with(Some(&broken), env_of(&[])),
            Err(ConfigError::Parse { .. })
        ));
    }
}
