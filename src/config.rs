use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::core::{validate_policy, DEFAULT_TRAIT_DIMENSIONS};
use crate::models::{GroupPolicy, ScoringWeights};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub appwrite: AppwriteSettings,
    pub collection: CollectionSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub ledger: LedgerSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppwriteSettings {
    pub endpoint: String,
    pub api_key: String,
    pub project_id: String,
    pub database_id: String,
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSettings {
    pub events: String,
    pub participants: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// Redis L2 tier; without it only the in-process tier is used
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_min_group_size")]
    pub min_group_size: usize,
    #[serde(default = "default_max_group_size")]
    pub max_group_size: usize,
    pub target_groups: Option<usize>,
    #[serde(default = "default_swap_pass_budget")]
    pub swap_pass_budget: usize,
    #[serde(default)]
    pub audit_previews: bool,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            min_group_size: default_min_group_size(),
            max_group_size: default_max_group_size(),
            target_groups: None,
            swap_pass_budget: default_swap_pass_budget(),
            audit_previews: false,
        }
    }
}

impl MatchingSettings {
    pub fn policy(&self) -> GroupPolicy {
        GroupPolicy {
            min_size: self.min_group_size,
            max_size: self.max_group_size,
            target_groups: self.target_groups,
            swap_pass_budget: self.swap_pass_budget,
        }
    }
}

fn default_min_group_size() -> usize { 4 }
fn default_max_group_size() -> usize { 6 }
fn default_swap_pass_budget() -> usize { 8 }

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default = "default_trait_dimensions")]
    pub trait_dimensions: usize,
    /// Per-dimension weights of the trait cosine; missing entries weigh 1.0
    #[serde(default)]
    pub dimension_weights: Vec<f64>,
    /// Intent tag pairs that may never share a table
    #[serde(default)]
    pub exclusive_intents: Vec<[String; 2]>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            weights: WeightsConfig::default(),
            trait_dimensions: default_trait_dimensions(),
            dimension_weights: Vec::new(),
            exclusive_intents: Vec::new(),
        }
    }
}

impl ScoringSettings {
    pub fn exclusive_intent_pairs(&self) -> Vec<(String, String)> {
        self.exclusive_intents
            .iter()
            .map(|[a, b]| (a.clone(), b.clone()))
            .collect()
    }
}

fn default_trait_dimensions() -> usize { DEFAULT_TRAIT_DIMENSIONS }

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_traits_weight")]
    pub traits: f64,
    #[serde(default = "default_intents_weight")]
    pub intents: f64,
    #[serde(default = "default_relationship_weight")]
    pub relationship: f64,
    #[serde(default = "default_depends_mixed_penalty")]
    pub depends_mixed_penalty: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            traits: default_traits_weight(),
            intents: default_intents_weight(),
            relationship: default_relationship_weight(),
            depends_mixed_penalty: default_depends_mixed_penalty(),
        }
    }
}

impl From<&WeightsConfig> for ScoringWeights {
    fn from(config: &WeightsConfig) -> Self {
        Self {
            traits: config.traits,
            intents: config.intents,
            relationship: config.relationship,
            depends_mixed_penalty: config.depends_mixed_penalty,
        }
    }
}

fn default_traits_weight() -> f64 { 0.70 }
fn default_intents_weight() -> f64 { 0.20 }
fn default_relationship_weight() -> f64 { 0.10 }
fn default_depends_mixed_penalty() -> f64 { 0.10 }

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSettings {
    /// `postgres` or `memory`
    #[serde(default = "default_ledger_backend")]
    pub backend: String,
    #[serde(default = "default_lock_retries")]
    pub lock_retries: u32,
    #[serde(default = "default_lock_retry_delay_ms")]
    pub lock_retry_delay_ms: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            backend: default_ledger_backend(),
            lock_retries: default_lock_retries(),
            lock_retry_delay_ms: default_lock_retry_delay_ms(),
        }
    }
}

fn default_ledger_backend() -> String { "postgres".to_string() }
fn default_lock_retries() -> u32 { 5 }
fn default_lock_retry_delay_ms() -> u64 { 50 }

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: String,
    #[serde(default = "default_admin_role")]
    pub admin_role: String,
}

fn default_admin_role() -> String { "admin".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "compact".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with TABLESETTER__)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., TABLESETTER__SERVER__PORT -> server.port
            .add_source(environment())
            .build()?;

        settings = substitute_env_vars(settings)?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject policies the matcher cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_policy(&self.matching.policy()).map_err(|e| ConfigError::Message(e.to_string()))?;

        if self.scoring.trait_dimensions == 0 {
            return Err(ConfigError::Message(
                "scoring.trait_dimensions must be at least 1".to_string(),
            ));
        }

        match self.ledger.backend.as_str() {
            "postgres" | "memory" => Ok(()),
            other => Err(ConfigError::Message(format!(
                "unknown ledger backend '{}', expected postgres or memory",
                other
            ))),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("TABLESETTER")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Apply the well-known environment overrides
///
/// `DATABASE_URL` and `TABLESETTER_JWT_SECRET` are honored without the
/// nested prefix so deployments can share them with other tooling.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(database_url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", database_url)?;
    }
    if let Ok(secret) = env::var("TABLESETTER_JWT_SECRET") {
        builder = builder.set_override("auth.jwt_secret", secret)?;
    }

    builder.build()
}
