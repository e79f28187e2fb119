use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::RepairError;

/// Location of the project-local config file, relative to the working directory.
pub const PROJECT_CONFIG_PATH: &str = ".repairs/config.toml";

/// Environment reader for dependency injection in tests.
pub trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment; empty values count as unset.
pub struct ProcessEnv;

impl EnvReader for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// A configured secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub relay: RelaySection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Where tickets live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl StorageBackend {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "memory" | "in-memory" | "mem" => Ok(Self::Memory),
            other => bail!("unknown storage backend '{other}': expected sqlite or memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_key: Option<Secret>,
}

/// Raw `[relay]` table; see [`ServiceConfig::relay`] for the validated form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySection {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default)]
    pub api_key: Option<Secret>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl RelaySection {
    fn is_blank(&self) -> bool {
        self.endpoint.is_none() && self.deployment.is_none() && self.api_key.is_none()
    }
}

/// Complete chat relay settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_key: Secret,
    pub api_version: String,
    pub system_prompt: String,
}

impl ServiceConfig {
    /// Parse a TOML document; missing tables fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML for this schema.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("parse repairs config")
    }

    /// Resolve the config file, parse it, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed. A malformed
    /// environment override surfaces as [`RepairError::Config`].
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let cwd = env::current_dir().context("resolve working directory")?;
        Self::load_with(cli_path, &ProcessEnv, &cwd)
    }

    /// [`ServiceConfig::load`] with an injected environment and working directory.
    ///
    /// # Errors
    ///
    /// Same as [`ServiceConfig::load`].
    pub fn load_with(cli_path: Option<&Path>, env: &dyn EnvReader, cwd: &Path) -> Result<Self> {
        let mut config = match resolve_config_path(cli_path, env, cwd) {
            Some(path) => load_config_file(&path)?,
            None => Self::default(),
        };
        config
            .apply_env(env)
            .map_err(|err| RepairError::Config(format!("{err:#}")))?;
        Ok(config)
    }

    /// Overlay environment variables on top of file values.
    ///
    /// # Errors
    ///
    /// Returns an error if `REPAIRS_BIND`, `PORT` or `REPAIRS_STORAGE` is malformed.
    pub fn apply_env(&mut self, env: &dyn EnvReader) -> Result<()> {
        if let Some(bind) = env.get("REPAIRS_BIND") {
            self.server.bind = bind
                .trim()
                .parse()
                .with_context(|| format!("invalid REPAIRS_BIND '{bind}'"))?;
        }
        if let Some(port) = env.get("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("invalid PORT '{port}'"))?;
            self.server.bind.set_port(port);
        }
        if let Some(backend) = env.get("REPAIRS_STORAGE") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(path) = env.get("REPAIRS_DB_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(key) = env.get("SECRET_API_KEY") {
            self.auth.api_key = Some(Secret::new(key));
        }
        if let Some(endpoint) = env.get("AZURE_OPENAI_ENDPOINT") {
            self.relay.endpoint = Some(endpoint);
        }
        if let Some(deployment) = env.get("AZURE_OPENAI_DEPLOYMENT_NAME") {
            self.relay.deployment = Some(deployment);
        }
        if let Some(key) = env.get("AZURE_OPENAI_API_KEY") {
            self.relay.api_key = Some(Secret::new(key));
        }
        if let Some(version) = env.get("AZURE_OPENAI_API_VERSION") {
            self.relay.api_version = Some(version);
        }
        Ok(())
    }

    /// The API key guarding the HTTP routes.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Config`] when no key is configured.
    pub fn require_api_key(&self) -> Result<&Secret, RepairError> {
        self.auth
            .api_key
            .as_ref()
            .filter(|key| !key.expose().trim().is_empty())
            .ok_or_else(|| {
                RepairError::Config(
                    "SECRET_API_KEY (or [auth] api_key) must be set to serve the repair API"
                        .to_string(),
                )
            })
    }

    /// Validated relay settings; `None` when the relay is not configured.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Config`] for a partially configured relay.
    pub fn relay(&self) -> Result<Option<RelayConfig>, RepairError> {
        let section = &self.relay;
        if section.is_blank() {
            return Ok(None);
        }

        let (Some(endpoint), Some(deployment), Some(api_key)) =
            (&section.endpoint, &section.deployment, &section.api_key)
        else {
            return Err(RepairError::Config(
                "relay requires endpoint, deployment and api_key together".to_string(),
            ));
        };

        Ok(Some(RelayConfig {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment: deployment.clone(),
            api_key: api_key.clone(),
            api_version: section
                .api_version
                .clone()
                .unwrap_or_else(default_relay_api_version),
            system_prompt: section
                .system_prompt
                .clone()
                .unwrap_or_else(default_system_prompt),
        }))
    }
}

/// Pick the config file: explicit path, `REPAIRS_CONFIG`, the project file,
/// then the user config directory. Only the explicit sources are returned
/// when the file is missing, so a typo surfaces as a read error.
pub fn resolve_config_path(
    cli_path: Option<&Path>,
    env: &dyn EnvReader,
    cwd: &Path,
) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env.get("REPAIRS_CONFIG") {
        return Some(PathBuf::from(path));
    }

    let project = cwd.join(PROJECT_CONFIG_PATH);
    if project.is_file() {
        return Some(project);
    }

    dirs::config_dir()
        .map(|dir| dir.join("repairs/config.toml"))
        .filter(|path| path.is_file())
}

/// Read and parse one config file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config_file(path: &Path) -> Result<ServiceConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    ServiceConfig::from_toml_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".repairs/repairs.sqlite3")
}

fn default_relay_api_version() -> String {
    "2024-12-01-preview".to_string()
}

fn default_system_prompt() -> String {
    "You are an AI agent that can chat with users.".to_string()
}
