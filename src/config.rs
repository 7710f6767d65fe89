use std::{collections::HashMap, collections::HashSet, path::PathBuf};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

/// Path used when `CONFIG_PATH` is not set. The extension is resolved by the
/// config crate, so `config/trawler.yaml` and `config/trawler.toml` both work.
pub const DEFAULT_CONFIG_PATH: &str = "config/trawler";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub global: GlobalConfig,
    #[serde(default)]
    pub alerting: AlertConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub sources: Vec<CrlSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub service_id: String,
    pub log_level: String,
    pub poll_interval_minutes: u64,
    pub request_timeout_secs: u64,
    /// Directory that relative issuer certificate paths are resolved against.
    pub ca_path: PathBuf,
}

/// One configured revocation list: where to fetch it and which certificate
/// must have signed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrlSource {
    pub name: String,
    pub url: String,
    pub cert_file: PathBuf,
}

impl CrlSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>, cert_file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            cert_file: cert_file.into(),
        }
    }

    /// Resolves the issuer certificate path, joining relative paths onto `ca_path`.
    pub fn issuer_certificate_path(&self, ca_path: &std::path::Path) -> PathBuf {
        if self.cert_file.is_absolute() {
            self.cert_file.clone()
        } else {
            ca_path.join(&self.cert_file)
        }
    }

    /// Storage key shared by every backend.
    pub fn artifact_key(&self) -> String {
        format!("{}.crl", self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub activate: bool,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub instance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub local: LocalStorageConfig,
    pub s3: S3Config,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub enabled: bool,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<SecretString>,
    #[serde(default)]
    pub allow_http: bool,
}

impl Config {
    /// Configuration file path from `CONFIG_PATH`, or [`DEFAULT_CONFIG_PATH`].
    pub fn path_from_env() -> String {
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn load_from(
        path: &str,
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("global.service_id", "trawler")?
            .set_default("global.log_level", "info")?
            .set_default("global.poll_interval_minutes", 15)?
            .set_default("global.request_timeout_secs", 30)?
            .set_default("global.ca_path", "data/ca")?
            .set_default("server.enabled", true)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("storage.local.enabled", true)?
            .set_default("storage.local.path", "data/crls")?
            .set_default("storage.s3.enabled", false)?
            .add_source(File::with_name(path).required(false));

        // Explicit overrides keep tests independent of the process environment
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // TRAWLER_GLOBAL__POLL_INTERVAL_MINUTES=5, TRAWLER_STORAGE__S3__BUCKET=crls, ...
            builder = builder.add_source(
                Environment::with_prefix("TRAWLER")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field the pipeline depends on. Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.global.poll_interval_minutes == 0 {
            return Err(invalid("global.poll_interval_minutes must be greater than zero"));
        }
        if self.global.request_timeout_secs == 0 {
            return Err(invalid("global.request_timeout_secs must be greater than zero"));
        }

        let mut names = HashSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            if source.name.trim().is_empty() {
                return Err(invalid(format!("sources[{index}].name is empty")));
            }
            if !names.insert(source.name.as_str()) {
                return Err(invalid(format!("duplicate source name '{}'", source.name)));
            }
            Url::parse(&source.url).map_err(|e| {
                invalid(format!("sources[{index}].url '{}' is invalid: {e}", source.url))
            })?;
            if source.cert_file.as_os_str().is_empty() {
                return Err(invalid(format!("sources[{index}].cert_file is empty")));
            }
        }

        if self.alerting.activate {
            let webhook = self
                .alerting
                .webhook_url
                .as_deref()
                .ok_or_else(|| invalid("alerting.webhook_url is required when alerting is active"))?;
            Url::parse(webhook)
                .map_err(|e| invalid(format!("alerting.webhook_url is invalid: {e}")))?;
        }

        if self.storage.local.enabled && self.storage.local.path.as_os_str().is_empty() {
            return Err(invalid("storage.local.path is required when local storage is enabled"));
        }
        if self.storage.s3.enabled && self.storage.s3.bucket.trim().is_empty() {
            return Err(invalid("storage.s3.bucket is required when S3 storage is enabled"));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.global.poll_interval_minutes * 60)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Message(message.into())
}
