//! Layered configuration via `ortho-config`.
//!
//! Each concern loads from its own prefixed environment variables (merged
//! with an optional `varta.toml`), mirroring how the deployment injects
//! settings. [`Settings`] aggregates the structs and enforces the
//! cross-field rules: a bot token is required as soon as any notification
//! is enabled, storage settings are required when inventory persistence is
//! on, and the info schedule must be complete whenever the info job is
//! needed at all.

use std::str::FromStr;

use chrono_tz::Tz;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default shell command for fetching the backup inventory.
pub const DEFAULT_INFO_COMMAND: &str = "echo 1";

/// Application-wide settings.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "APP")]
pub struct AppConfig {
    /// IANA timezone name used for every rendered date and for cron
    /// evaluation. The parsed value is threaded explicitly through job and
    /// scheduler construction; nothing reads it from ambient state.
    #[ortho_config(default = "UTC".to_owned())]
    pub timezone: String,
    /// Whether parsed inventories are archived to object storage.
    #[ortho_config(default = false)]
    pub save_logs: bool,
}

/// Cluster endpoint and exec target settings.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "K8S")]
pub struct KubernetesConfig {
    /// Base URL of the cluster API server (for example `https://10.0.0.1:6443`).
    pub host: String,
    /// Whether to skip TLS certificate verification. Defaults to true
    /// because the usual deployment talks to the in-cluster endpoint via
    /// its service IP.
    #[ortho_config(default = true)]
    pub insecure: bool,
    /// Bearer token of the service account used for pod listing and exec.
    pub bearer_token: String,
    /// Namespace holding the target pod.
    pub namespace: String,
    /// Label selector identifying the target pod.
    pub label_selector: String,
    /// Container name within the target pod.
    pub container_name: String,
}

/// Shell commands executed inside the remote container.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "EXEC")]
pub struct ExecConfig {
    /// Command that triggers a backup.
    pub backup: String,
    /// Command that prints the backup inventory as a JSON array.
    #[ortho_config(default = DEFAULT_INFO_COMMAND.to_owned())]
    pub info: String,
}

/// Cron cadences, six fields with seconds resolution.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "CRON")]
pub struct CronConfig {
    /// Cadence of the backup job.
    pub backup: String,
    /// Cadence of the info job; required only when the info job is needed.
    pub info: Option<String>,
}

/// Telegram transport and per-job notification settings.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "TG")]
pub struct TelegramConfig {
    /// Bot API endpoint; overridable for self-hosted Bot API deployments.
    #[ortho_config(default = "https://api.telegram.org".to_owned())]
    pub api_endpoint: String,
    /// Optional HTTP proxy for reaching the Bot API.
    pub http_proxy: Option<String>,
    /// Bot token; required once any notification flag is enabled.
    pub bot_token: Option<String>,
    /// Whether the backup job sends start/end notifications.
    #[ortho_config(default = false)]
    pub backup_notification_enabled: bool,
    /// Comma-separated chat ids receiving backup notifications.
    #[ortho_config(default = String::new())]
    pub backup_notification_chats: String,
    /// Whether the info job sends inventory notifications.
    #[ortho_config(default = false)]
    pub info_notification_enabled: bool,
    /// Comma-separated chat ids receiving inventory notifications.
    #[ortho_config(default = String::new())]
    pub info_notification_chats: String,
}

/// S3-compatible object storage settings; required when `save_logs` is on.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "FS")]
pub struct FileStorageConfig {
    /// Storage endpoint host, optionally with port (for example
    /// `minio.internal:9000`).
    pub endpoint: Option<String>,
    /// Bucket receiving inventory archives.
    pub bucket: Option<String>,
    /// Access key for request signing.
    pub access_key: Option<String>,
    /// Secret key for request signing.
    pub secret_key: Option<String>,
    /// Signing region; MinIO accepts the default.
    #[ortho_config(default = "us-east-1".to_owned())]
    pub region: String,
    /// Whether to reach the endpoint over HTTPS.
    #[ortho_config(default = true)]
    pub secure: bool,
}

/// Errors raised while loading or validating configuration. Fatal at
/// startup; nothing in the running system tolerates a bad configuration.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Indicates a required configuration value is empty or missing.
    #[error("missing {description}: set {env_var} or add {toml_key} to varta.toml")]
    MissingField {
        /// Human description of the value.
        description: &'static str,
        /// Environment variable that provides it.
        env_var: &'static str,
        /// Configuration file key that provides it.
        toml_key: &'static str,
    },
    /// Indicates the configured timezone name is not a known IANA zone.
    #[error("unknown timezone '{name}': set APP_TIMEZONE to an IANA zone name")]
    InvalidTimezone {
        /// Value that failed to parse.
        name: String,
    },
    /// Indicates a chat id list entry is not a valid integer.
    #[error("invalid chat id '{value}' in {env_var}: expected a comma-separated list of integers")]
    InvalidChatId {
        /// Offending list entry.
        value: String,
        /// Environment variable holding the list.
        env_var: &'static str,
    },
}

fn require(
    value: &str,
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField {
            description,
            env_var,
            toml_key,
        });
    }
    Ok(())
}

fn require_present(
    value: Option<&str>,
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
) -> Result<(), ConfigError> {
    require(value.unwrap_or_default(), description, env_var, toml_key)
}

fn parse_chat_ids(raw: &str, env_var: &'static str) -> Result<Vec<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidChatId {
                    value: entry.to_owned(),
                    env_var,
                })
        })
        .collect()
}

impl TelegramConfig {
    /// Returns true when either job has notifications enabled.
    #[must_use]
    pub const fn notifications_enabled(&self) -> bool {
        self.backup_notification_enabled || self.info_notification_enabled
    }

    /// Parses the backup notification chat id list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidChatId`] on non-integer entries.
    pub fn backup_chat_ids(&self) -> Result<Vec<i64>, ConfigError> {
        parse_chat_ids(
            &self.backup_notification_chats,
            "TG_BACKUP_NOTIFICATION_CHATS",
        )
    }

    /// Parses the info notification chat id list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidChatId`] on non-integer entries.
    pub fn info_chat_ids(&self) -> Result<Vec<i64>, ConfigError> {
        parse_chat_ids(&self.info_notification_chats, "TG_INFO_NOTIFICATION_CHATS")
    }
}

/// Aggregated, validated application settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Application-wide settings.
    pub app: AppConfig,
    /// Cluster and exec target settings.
    pub kubernetes: KubernetesConfig,
    /// Remote commands.
    pub exec: ExecConfig,
    /// Cron cadences.
    pub cron: CronConfig,
    /// Notification settings.
    pub telegram: TelegramConfig,
    /// Object storage settings.
    pub file_storage: FileStorageConfig,
}

impl Settings {
    /// Loads every configuration struct from its layered sources and
    /// validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when a loader fails to merge sources,
    /// plus any validation error described on [`Settings::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Self {
            app: load_section::<AppConfig>()?,
            kubernetes: load_section::<KubernetesConfig>()?,
            exec: load_section::<ExecConfig>()?,
            cron: load_section::<CronConfig>()?,
            telegram: load_section::<TelegramConfig>()?,
            file_storage: load_section::<FileStorageConfig>()?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Returns true when the info job must be scheduled: either inventory
    /// persistence or inventory notifications are enabled.
    #[must_use]
    pub const fn info_job_required(&self) -> bool {
        self.app.save_logs || self.telegram.info_notification_enabled
    }

    /// Parses the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTimezone`] for unknown zone names.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        Tz::from_str(&self.app.timezone).map_err(|_| ConfigError::InvalidTimezone {
            name: self.app.timezone.clone(),
        })
    }

    /// Performs semantic validation across all sections.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for empty required values,
    /// [`ConfigError::InvalidTimezone`] for unknown zone names, and
    /// [`ConfigError::InvalidChatId`] for malformed chat id lists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timezone()?;

        require(&self.kubernetes.host, "cluster API host", "K8S_HOST", "host")?;
        require(
            &self.kubernetes.bearer_token,
            "cluster bearer token",
            "K8S_BEARER_TOKEN",
            "bearer_token",
        )?;
        require(
            &self.kubernetes.namespace,
            "target namespace",
            "K8S_NAMESPACE",
            "namespace",
        )?;
        require(
            &self.kubernetes.label_selector,
            "pod label selector",
            "K8S_LABEL_SELECTOR",
            "label_selector",
        )?;
        require(
            &self.kubernetes.container_name,
            "container name",
            "K8S_CONTAINER_NAME",
            "container_name",
        )?;
        require(&self.exec.backup, "backup command", "EXEC_BACKUP", "backup")?;
        require(&self.cron.backup, "backup cadence", "CRON_BACKUP", "backup")?;

        self.telegram.backup_chat_ids()?;
        self.telegram.info_chat_ids()?;

        if self.telegram.notifications_enabled() {
            require_present(
                self.telegram.bot_token.as_deref(),
                "bot token (required when any notification is enabled)",
                "TG_BOT_TOKEN",
                "bot_token",
            )?;
        }

        if self.info_job_required() {
            require_present(
                self.cron.info.as_deref(),
                "info cadence (required when inventory reporting or persistence is enabled)",
                "CRON_INFO",
                "info",
            )?;
            require(
                &self.exec.info,
                "info command (required when inventory reporting or persistence is enabled)",
                "EXEC_INFO",
                "info",
            )?;
        }

        if self.app.save_logs {
            require_present(
                self.file_storage.endpoint.as_deref(),
                "storage endpoint (required when save_logs is enabled)",
                "FS_ENDPOINT",
                "endpoint",
            )?;
            require_present(
                self.file_storage.bucket.as_deref(),
                "storage bucket (required when save_logs is enabled)",
                "FS_BUCKET",
                "bucket",
            )?;
            require_present(
                self.file_storage.access_key.as_deref(),
                "storage access key (required when save_logs is enabled)",
                "FS_ACCESS_KEY",
                "access_key",
            )?;
            require_present(
                self.file_storage.secret_key.as_deref(),
                "storage secret key (required when save_logs is enabled)",
                "FS_SECRET_KEY",
                "secret_key",
            )?;
        }

        Ok(())
    }
}

fn load_section<T: OrthoConfig>() -> Result<T, ConfigError> {
    T::load_from_iter([std::ffi::OsString::from("varta")])
        .map_err(|err| ConfigError::Parse(err.to_string()))
}

#[cfg(test)]
mod tests;
