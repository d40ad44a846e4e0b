//! Runtime configuration for the `doorkeeper` binary.
//!
//! Values are layered with figment, later sources overriding earlier ones:
//!
//! ```text
//! built-in defaults
//!   └─ YAML file (--config, default config/doorkeeper.yaml)
//!        └─ DOORKEEPER_* environment (`__` separates sections)
//! ```
//!
//! `DOORKEEPER_CREDENTIALS__API_TOKEN=...` sets `credentials.api_token`.
//! Every credential may instead point at a file through its `*_file` key;
//! the first line of that file is used.

use doorkeeper_cache::{CacheConfig, HttpSourceConfig};
use doorkeeper_controller::{ControllerConfig, GatewayConfig};
use doorkeeper_core::constants::*;
use doorkeeper_dispatch::ChatConfig;
use doorkeeper_hardware::{LockConfig, PanelConfig, ReaderConfig};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config/doorkeeper.yaml";

/// Prefix of the environment variables merged over the file.
pub const ENV_PREFIX: &str = "DOORKEEPER_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("configuration parsing failed: {0}")]
    Parsing(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("cannot read credential file {path}: {source}")]
    CredentialFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Parsing(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSection {
    pub device: String,
    pub baud_rate: u32,
    pub poll_interval_ms: u64,
    pub liveness_every: u64,
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            poll_interval_ms: DEFAULT_READER_POLL_MS,
            liveness_every: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSection {
    pub device: String,
    pub baud_rate: u32,
    pub poll_interval_ms: u64,
    pub status_timeout_ms: u64,
    pub command_timeout_ms: u64,
}

impl Default for LockSection {
    fn default() -> Self {
        Self {
            device: "/dev/ttyACM0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            poll_interval_ms: DEFAULT_LOCK_POLL_MS,
            status_timeout_ms: DEFAULT_LOCK_STATUS_TIMEOUT_MS,
            command_timeout_ms: DEFAULT_LOCK_COMMAND_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSection {
    pub device: String,
    pub baud_rate: u32,
    pub poll_interval_ms: u64,
    pub reply_timeout_ms: u64,
}

impl Default for PanelSection {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB1".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            poll_interval_ms: 50,
            reply_timeout_ms: 100,
        }
    }
}

/// Permission service and card cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub base_url: String,
    pub staleness_secs: u64,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            base_url: "https://panopticon.hal9k.dk".to_string(),
            staleness_secs: DEFAULT_CACHE_STALENESS_SECS,
            refresh_interval_secs: DEFAULT_CACHE_REFRESH_SECS,
            request_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

/// Remote gateway, also the debug log endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub url: String,
    pub status_push_secs: u64,
    pub sync_interval_secs: u64,
    pub max_failures: u32,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            url: "https://acsgateway.hal9k.dk".to_string(),
            status_push_secs: DEFAULT_STATUS_PUSH_SECS,
            sync_interval_secs: 10,
            max_failures: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    pub api_url: String,
    pub monitoring_channel: String,
    pub general_channel: String,
    pub testing_channel: String,
    pub test_mode: bool,
    pub icon_emoji: String,
    /// Prefix every message with the door name.
    pub door_prefix: bool,
}

impl Default for ChatSection {
    fn default() -> Self {
        let chat = ChatConfig::default();
        Self {
            api_url: chat.api_url,
            monitoring_channel: chat.monitoring_channel,
            general_channel: chat.general_channel,
            testing_channel: chat.testing_channel,
            test_mode: chat.test_mode,
            icon_emoji: chat.icon_emoji,
            door_prefix: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipSection {
    pub base_url: String,
}

impl Default for MembershipSection {
    fn default() -> Self {
        Self {
            base_url: "https://medlem.hal9k.dk".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    pub log_capacity: usize,
    pub chat_capacity: usize,
    pub membership_capacity: usize,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_QUEUE_CAPACITY,
            chat_capacity: DEFAULT_CHAT_QUEUE_CAPACITY,
            membership_capacity: DEFAULT_MEMBERSHIP_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSection {
    pub door_name: String,
    pub tick_ms: u64,
    pub enter_secs: u64,
    pub leave_secs: u64,
    pub unlock_period_secs: u64,
    pub unlock_warn_secs: u64,
    pub remote_unlock_secs: u64,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            door_name: "main".to_string(),
            tick_ms: DEFAULT_TICK_MS,
            enter_secs: DEFAULT_ENTER_SECS,
            leave_secs: DEFAULT_LEAVE_SECS,
            unlock_period_secs: DEFAULT_UNLOCK_PERIOD_SECS,
            unlock_warn_secs: DEFAULT_UNLOCK_WARN_SECS,
            remote_unlock_secs: DEFAULT_REMOTE_UNLOCK_SECS,
        }
    }
}

/// Secrets, given inline or as `*_file` paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub api_token: Option<String>,
    pub api_token_file: Option<PathBuf>,
    pub gateway_token: Option<String>,
    pub gateway_token_file: Option<PathBuf>,
    pub chat_token: Option<String>,
    pub chat_token_file: Option<PathBuf>,
    pub membership_user: Option<String>,
    pub membership_user_file: Option<PathBuf>,
    pub membership_password: Option<String>,
    pub membership_password_file: Option<PathBuf>,
}

/// Credentials after file indirection has been resolved.
#[derive(Clone, PartialEq)]
pub struct ResolvedCredentials {
    pub api_token: String,
    pub gateway_token: String,
    pub chat_token: Option<String>,
    pub membership_user: Option<String>,
    pub membership_password: Option<String>,
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("chat_token", &self.chat_token.is_some())
            .field("membership_user", &self.membership_user)
            .field("membership_password", &self.membership_password.is_some())
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Read credential files and check that the mandatory tokens are present.
    pub fn resolve(&self) -> Result<ResolvedCredentials> {
        let api_token = read_secret(&self.api_token, &self.api_token_file)?
            .ok_or(ConfigError::MissingCredential("api_token"))?;
        let gateway_token = read_secret(&self.gateway_token, &self.gateway_token_file)?
            .ok_or(ConfigError::MissingCredential("gateway_token"))?;
        Ok(ResolvedCredentials {
            api_token,
            gateway_token,
            chat_token: read_secret(&self.chat_token, &self.chat_token_file)?,
            membership_user: read_secret(&self.membership_user, &self.membership_user_file)?,
            membership_password: read_secret(
                &self.membership_password,
                &self.membership_password_file,
            )?,
        })
    }
}

/// Inline value first, then the first line of the file. Blank means unset.
fn read_secret(inline: &Option<String>, file: &Option<PathBuf>) -> Result<Option<String>> {
    if let Some(value) = inline.as_deref().map(str::trim)
        && !value.is_empty()
    {
        return Ok(Some(value.to_string()));
    }
    let Some(path) = file else {
        return Ok(None);
    };
    let content = fs::read_to_string(path).map_err(|source| ConfigError::CredentialFile {
        path: path.clone(),
        source,
    })?;
    Ok(content
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string))
}

/// Complete configuration of one door.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoorkeeperConfig {
    pub reader: ReaderSection,
    pub lock: LockSection,
    pub panel: PanelSection,
    pub cache: CacheSection,
    pub gateway: GatewaySection,
    pub chat: ChatSection,
    pub membership: MembershipSection,
    pub dispatch: DispatchSection,
    pub controller: ControllerSection,
    pub credentials: Credentials,
}

impl DoorkeeperConfig {
    /// Load defaults, the YAML file and the environment, then validate.
    ///
    /// An explicitly given file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path.to_path_buf())),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_PATH),
        };
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Yaml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    /// Extract and validate a configuration from an assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("reader.poll_interval_ms", self.reader.poll_interval_ms),
            ("lock.poll_interval_ms", self.lock.poll_interval_ms),
            ("lock.status_timeout_ms", self.lock.status_timeout_ms),
            ("lock.command_timeout_ms", self.lock.command_timeout_ms),
            ("panel.poll_interval_ms", self.panel.poll_interval_ms),
            ("panel.reply_timeout_ms", self.panel.reply_timeout_ms),
            ("cache.staleness_secs", self.cache.staleness_secs),
            ("cache.refresh_interval_secs", self.cache.refresh_interval_secs),
            ("cache.request_timeout_secs", self.cache.request_timeout_secs),
            ("gateway.status_push_secs", self.gateway.status_push_secs),
            ("gateway.sync_interval_secs", self.gateway.sync_interval_secs),
            ("controller.tick_ms", self.controller.tick_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::invalid(format!("{name} must be greater than zero")));
        }

        let capacities = [
            ("dispatch.log_capacity", self.dispatch.log_capacity),
            ("dispatch.chat_capacity", self.dispatch.chat_capacity),
            ("dispatch.membership_capacity", self.dispatch.membership_capacity),
        ];
        if let Some((name, _)) = capacities.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::invalid(format!("{name} must be greater than zero")));
        }

        if self.gateway.max_failures == 0 {
            return Err(ConfigError::invalid("gateway.max_failures must be greater than zero"));
        }
        for (name, url) in [
            ("cache.base_url", &self.cache.base_url),
            ("gateway.url", &self.gateway.url),
            ("chat.api_url", &self.chat.api_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::invalid(format!("{name} is not an HTTP URL: '{url}'")));
            }
        }
        self.controller_config()
            .validate()
            .map_err(|e| ConfigError::invalid(e.to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.cache.request_timeout_secs)
    }

    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig::default()
            .poll_interval(Duration::from_millis(self.reader.poll_interval_ms))
            .liveness_every(self.reader.liveness_every)
    }

    pub fn lock_config(&self) -> LockConfig {
        LockConfig::default()
            .poll_interval(Duration::from_millis(self.lock.poll_interval_ms))
            .status_timeout(Duration::from_millis(self.lock.status_timeout_ms))
            .command_timeout(Duration::from_millis(self.lock.command_timeout_ms))
    }

    pub fn panel_config(&self) -> PanelConfig {
        PanelConfig {
            poll_interval: Duration::from_millis(self.panel.poll_interval_ms),
            reply_timeout: Duration::from_millis(self.panel.reply_timeout_ms),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::default()
            .staleness(Duration::from_secs(self.cache.staleness_secs))
            .refresh_interval(Duration::from_secs(self.cache.refresh_interval_secs))
    }

    pub fn permission_source_config(&self, credentials: &ResolvedCredentials) -> HttpSourceConfig {
        HttpSourceConfig::new(&self.cache.base_url)
            .api_token(&credentials.api_token)
            .timeout(self.request_timeout())
    }

    pub fn gateway_config(&self, credentials: &ResolvedCredentials) -> GatewayConfig {
        GatewayConfig::new(&self.gateway.url, &credentials.gateway_token)
            .sync_interval(Duration::from_secs(self.gateway.sync_interval_secs))
            .max_failures(self.gateway.max_failures)
            .timeout(self.request_timeout())
    }

    pub fn chat_config(&self, credentials: &ResolvedCredentials) -> ChatConfig {
        let mut chat = ChatConfig {
            monitoring_channel: self.chat.monitoring_channel.clone(),
            general_channel: self.chat.general_channel.clone(),
            testing_channel: self.chat.testing_channel.clone(),
            icon_emoji: self.chat.icon_emoji.clone(),
            timeout: self.request_timeout(),
            ..ChatConfig::default()
        }
        .api_url(&self.chat.api_url)
        .test_mode(self.chat.test_mode);
        if let Some(token) = &credentials.chat_token {
            chat = chat.token(token);
        }
        chat
    }

    pub fn controller_config(&self) -> ControllerConfig {
        let c = &self.controller;
        ControllerConfig {
            leave_time: Duration::from_secs(c.leave_secs),
            unlock_warn: Duration::from_secs(c.unlock_warn_secs),
            remote_unlock: Duration::from_secs(c.remote_unlock_secs),
            ..ControllerConfig::default()
        }
        .door_name(&c.door_name)
        .tick_interval(Duration::from_millis(c.tick_ms))
        .enter_time(Duration::from_secs(c.enter_secs))
        .unlock_period(Duration::from_secs(c.unlock_period_secs))
        .status_push(Duration::from_secs(self.gateway.status_push_secs))
    }
}
