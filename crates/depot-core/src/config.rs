//! Configuration management for depot
//!
//! Loads configuration with priority:
//! 1. config.toml (or specified config file)
//! 2. Environment variables (override)
//! 3. Defaults
//!
//! The resulting [`DepotConfig`] is built once at startup and handed to each
//! component; nothing reads configuration from global state afterwards.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the shared access secret
pub const ACCESS_KEY_ENV: &str = "ACCESS_KEY";

/// Environment variable overriding the listen port
pub const PORT_ENV: &str = "PORT";

/// Environment variable overriding the bind host
pub const HOST_ENV: &str = "DEPOT_HOST";

/// Environment variable overriding the storage root
pub const STORAGE_ROOT_ENV: &str = "DEPOT_STORAGE_ROOT";

/// depot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepotConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on the time a single request may take, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// How the "latest" version of an artifact is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatestPolicy {
    /// Greatest file name in byte order.
    Lexicographic,
    /// Greatest embedded capture timestamp, then collision sequence.
    #[default]
    Chronological,
}

/// Artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory under which `{organization}/{project}/{type}` trees live
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    #[serde(default)]
    pub latest_policy: LatestPolicy,
}

/// Access control configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared access secret (can reference env var with ${VAR_NAME})
    pub access_key: Option<String>,

    /// Require the access key on uploads as well as downloads
    #[serde(default = "default_protect_uploads")]
    pub protect_uploads: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_key", &self.access_key.as_ref().map(|_| "[REDACTED]"))
            .field("protect_uploads", &self.protect_uploads)
            .finish()
    }
}

/// Request size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Hard cap on the upload request body, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Cap on multipart fields held in memory (the `meta` field), in bytes
    #[serde(default = "default_max_form_memory_bytes")]
    pub max_form_memory_bytes: u64,
}

/// Download response configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Content type sent with every download
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            latest_policy: LatestPolicy::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            protect_uploads: default_protect_uploads(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_form_memory_bytes: default_max_form_memory_bytes(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            content_type: default_content_type(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    /// Request deadline as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `host:port` string suitable for binding a listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DepotConfig {
    /// Load configuration with the following priority:
    /// 1. config.toml in current directory or a parent
    /// 2. Environment variables
    /// 3. Defaults
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file, or search for config.toml
    /// when no path is given. A missing config.toml is not an error; an
    /// explicitly named file that cannot be read is.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::find_config_file()?,
        };

        let mut config = match config_path {
            Some(config_path) => {
                tracing::debug!("Loading configuration from: {:?}", config_path);

                let contents = fs::read_to_string(&config_path)
                    .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

                Self::from_toml(&contents)
                    .with_context(|| format!("Failed to parse config file: {:?}", config_path))?
            }
            None => {
                tracing::debug!("No config.toml found, using defaults");
                Self::default()
            }
        };

        config.apply_overrides(|name| env::var(name).ok())?;

        Ok(config)
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Find config.toml by searching current directory and parents
    fn find_config_file() -> Result<Option<PathBuf>> {
        let mut current = env::current_dir()?;

        loop {
            let config_path = current.join("config.toml");
            if config_path.exists() {
                return Ok(Some(config_path));
            }

            if !current.pop() {
                return Ok(None);
            }
        }
    }

    /// Resolve ${VAR_NAME} references and apply environment overrides.
    ///
    /// `lookup` maps a variable name to its value; the loader passes the
    /// process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Resolve auth.access_key, falling back to ACCESS_KEY
        self.auth.access_key = match self.auth.access_key.take() {
            Some(key) => Self::resolve_env_var(&key, &lookup),
            None => lookup(ACCESS_KEY_ENV),
        };

        if let Some(port) = lookup(PORT_ENV).filter(|p| !p.is_empty()) {
            self.server.port = port
                .parse()
                .map_err(|_| anyhow!("{} must be a port number, got {:?}", PORT_ENV, port))?;
        }

        if let Some(host) = lookup(HOST_ENV).filter(|h| !h.is_empty()) {
            self.server.host = host;
        }

        if let Some(root) = lookup(STORAGE_ROOT_ENV).filter(|r| !r.is_empty()) {
            self.storage.root = PathBuf::from(root);
        }

        Ok(())
    }

    /// Resolve a single ${VAR_NAME} reference
    fn resolve_env_var<F>(value: &str, lookup: &F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            lookup(var_name)
        } else {
            Some(value.to_string())
        }
    }

    /// Get the access secret with a clear error message.
    ///
    /// The server refuses to start when this fails.
    pub fn access_key(&self) -> Result<String> {
        self.auth
            .access_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "Access key not configured. Set it in config.toml:\n\
                    [auth]\n\
                    access_key = \"a-secure-value\"\n\
                    \n\
                    Or set environment variable:\n\
                    export {}=\"a-secure-value\"",
                    ACCESS_KEY_ENV
                )
            })
    }

    /// Create test-friendly defaults rooted at `root`
    pub fn test_defaults(root: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig {
                root: root.into(),
                latest_policy: LatestPolicy::Chronological,
            },
            auth: AuthConfig {
                access_key: Some("test-access-key".to_string()),
                protect_uploads: true,
            },
            ..Self::default()
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("files")
}

fn default_protect_uploads() -> bool {
    true
}

fn default_max_upload_bytes() -> u64 {
    1024 * 1024 * 1500 // 1500 MiB
}

fn default_max_form_memory_bytes() -> u64 {
    1024 * 1024 * 512 // 512 MiB
}

fn default_content_type() -> String {
    "image/png".to_string()
}

fn default_service_name() -> String {
    "depot".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = DepotConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.root, PathBuf::from("files"));
        assert_eq!(config.storage.latest_policy, LatestPolicy::Chronological);
        assert_eq!(config.limits.max_upload_bytes, 1_572_864_000);
        assert_eq!(config.download.content_type, "image/png");
        assert!(config.auth.protect_uploads);
    }

    #[test]
    fn test_parse_toml() {
        let config = DepotConfig::from_toml(
            r#"
            [server]
            port = 9000

            [storage]
            root = "/data"
            latest_policy = "lexicographic"

            [auth]
            access_key = "s3cret"
            protect_uploads = false

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.root, PathBuf::from("/data"));
        assert_eq!(config.storage.latest_policy, LatestPolicy::Lexicographic);
        assert_eq!(config.access_key().unwrap(), "s3cret");
        assert!(!config.auth.protect_uploads);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_resolve_env_var() {
        let lookup = env_from(&[("TEST_VAR", "test_value")]);

        let resolved = DepotConfig::resolve_env_var("${TEST_VAR}", &lookup);
        assert_eq!(resolved, Some("test_value".to_string()));

        let not_var = DepotConfig::resolve_env_var("plain_value", &lookup);
        assert_eq!(not_var, Some("plain_value".to_string()));

        let missing = DepotConfig::resolve_env_var("${MISSING}", &lookup);
        assert_eq!(missing, None);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = DepotConfig::default();
        config
            .apply_overrides(env_from(&[
                ("ACCESS_KEY", "from-env"),
                ("PORT", "9090"),
                ("DEPOT_STORAGE_ROOT", "/srv/depot"),
            ]))
            .unwrap();

        assert_eq!(config.access_key().unwrap(), "from-env");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.storage.root, PathBuf::from("/srv/depot"));
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = DepotConfig::default();
        let result = config.apply_overrides(env_from(&[("PORT", "eighty")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_access_key_reference() {
        let mut config = DepotConfig::from_toml(
            r#"
            [auth]
            access_key = "${DEPOT_SECRET}"
            "#,
        )
        .unwrap();
        config
            .apply_overrides(env_from(&[("DEPOT_SECRET", "resolved")]))
            .unwrap();

        assert_eq!(config.access_key().unwrap(), "resolved");
    }

    #[test]
    fn test_access_key_error_message() {
        let mut config = DepotConfig::default();
        config.apply_overrides(env_from(&[])).unwrap();

        let result = config.access_key();
        assert!(result.is_err());
        let error_msg = result.unwrap_err().to_string();
        assert!(error_msg.contains("config.toml"));
        assert!(error_msg.contains("ACCESS_KEY"));
    }

    #[test]
    fn test_blank_access_key_rejected() {
        let mut config = DepotConfig::default();
        config.auth.access_key = Some("   ".to_string());
        assert!(config.access_key().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("depot.toml");
        fs::write(
            &path,
            r#"
            [auth]
            access_key = "file-key"
            "#,
        )
        .unwrap();

        let config = DepotConfig::load_from(Some(&path)).unwrap();
        assert!(config.auth.access_key.is_some());
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = DepotConfig::load_from(Some(&dir.path().join("absent.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_access_key() {
        let config = DepotConfig::test_defaults("/tmp/depot");
        let debug = format!("{:?}", config.auth);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("test-access-key"));
    }
}
