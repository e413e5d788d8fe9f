use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024; // 64 KB hard cap per inbound frame
pub const DEFAULT_WORKER_ID: u16 = 1;
pub const UNRESOLVED_IDENTITY: &str = "unresolved";

/// Top-level config (parley.toml + PARLEY_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sequence: SequenceConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Inbound text frames above this size close the connection.
    #[serde(default = "default_max_payload")]
    pub max_payload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            max_payload_bytes: MAX_PAYLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Node identifier baked into every message id (0..=1023).
    #[serde(default = "default_worker_id")]
    pub worker_id: u16,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            worker_id: DEFAULT_WORKER_ID,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResolverMode {
    /// identity = token
    #[default]
    PassThrough,
    /// Fixed token → identity table from `resolver.tokens`.
    Static,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub mode: ResolverMode,
    #[serde(default)]
    pub tokens: HashMap<String, String>,
    /// When false, tokens the resolver cannot map are admitted under
    /// [`UNRESOLVED_IDENTITY`] instead of being rejected.
    #[serde(default)]
    pub reject_unresolved: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_max_payload() -> usize {
    MAX_PAYLOAD_BYTES
}
fn default_worker_id() -> u16 {
    DEFAULT_WORKER_ID
}

impl ParleyConfig {
    /// Load config from defaults, then a TOML file, then PARLEY_* env vars.
    ///
    /// Nested keys use a double underscore: `PARLEY_SERVER__PORT=9000`.
    /// A missing file is not an error; the TOML layer is simply empty.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::ParleyError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(ParleyConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("PARLEY_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.parley/parley.toml", home)
}
