use directories::{BaseDirs, ProjectDirs};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const BASE_URL_ENV: &str = "DOCENT_BASE_URL";

/// Deployment-level settings for the request layer.
///
/// Base address and deadline apply to every call; nothing per-request can
/// override them.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Docent configuration invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(detail) => format!("Docent not configured: {detail}. Update docent.yaml."),
        }
    }
}

impl ClientSettings {
    /// Loads `docent.yaml` if one exists, then applies `.env` and process
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let file = match locate_config_file() {
            Some(path) => {
                let contents = fs::read_to_string(&path).map_err(|err| {
                    ConfigError::Invalid(format!("failed to read {}: {err}", path.display()))
                })?;
                parse_config(&contents)?
            }
            None => DocentConfig::default(),
        };
        let env_base_url = std::env::var(BASE_URL_ENV).ok();
        resolve_settings(file.client.unwrap_or_default(), env_base_url)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_data_dir(mut self, data_dir: Option<PathBuf>) -> Self {
        self.data_dir = data_dir;
        self
    }
}

fn parse_config(contents: &str) -> Result<DocentConfig, ConfigError> {
    if contents.trim().is_empty() {
        return Ok(DocentConfig::default());
    }
    serde_yaml::from_str(contents)
        .map_err(|err| ConfigError::Invalid(format!("invalid docent.yaml: {err}")))
}

fn resolve_settings(
    section: ClientSection,
    env_base_url: Option<String>,
) -> Result<ClientSettings, ConfigError> {
    let defaults = ClientSettings::default();
    let base_url = env_base_url
        .filter(|value| !value.trim().is_empty())
        .or(section.base_url)
        .map(|value| value.trim().to_string())
        .unwrap_or(defaults.base_url);
    Url::parse(&base_url)
        .map_err(|err| ConfigError::Invalid(format!("base_url `{base_url}` is not a URL: {err}")))?;

    let timeout_ms = section.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "timeout_ms must be greater than zero".to_string(),
        ));
    }

    Ok(ClientSettings {
        base_url,
        timeout: Duration::from_millis(timeout_ms),
        data_dir: section.data_dir.or(defaults.data_dir),
    })
}

fn default_data_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "docent").map(|dirs| dirs.data_dir().to_path_buf())
}

fn locate_config_file() -> Option<PathBuf> {
    docent_yaml_candidates()
        .into_iter()
        .find(|path| path.exists())
}

fn docent_yaml_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(base) = BaseDirs::new() {
        let config_dir = base.config_dir().join("docent");
        paths.push(config_dir.join("docent.yaml"));
        paths.push(config_dir.join("docent.yml"));
        let home_dir = base.home_dir();
        paths.push(home_dir.join(".docent").join("docent.yaml"));
        paths.push(home_dir.join(".docent").join("docent.yml"));
    } else {
        paths.push(PathBuf::from("docent.yaml"));
        paths.push(PathBuf::from("docent.yml"));
    }
    paths
}

#[derive(Debug, Default, Deserialize)]
struct DocentConfig {
    client: Option<ClientSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ClientSection {
    base_url: Option<String>,
    timeout_ms: Option<u64>,
    data_dir: Option<PathBuf>,
}
