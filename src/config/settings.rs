use std::time::Duration;

use clickup::{CacheTtls, ClientConfig, ExecutorConfig, RetryPolicy, DEFAULT_BASE_URL};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub clickup: ClickUpSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub cache: CacheSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClickUpSettings {
    #[serde(default)]
    pub token: String,
    /// `team_id` na API v2
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ClickUpSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            workspace_id: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitSettings {
    pub min_spacing_ms: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            min_spacing_ms: 600,
            max_attempts: 5,
            base_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CacheSettings {
    pub hierarchy_ttl_secs: u64,
    pub members_ttl_secs: u64,
    pub tags_ttl_secs: u64,
    pub custom_fields_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            hierarchy_ttl_secs: 5 * 60,
            members_ttl_secs: 10 * 60,
            tags_ttl_secs: 15 * 60,
            custom_fields_ttl_secs: 30 * 60,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            // Arquivo de configuração base
            .add_source(File::with_name("config/default").required(false))
            // Arquivo específico do ambiente
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::with_prefix("CLICKUP_GATEWAY").separator("__"));

        // Variáveis de ambiente específicas têm precedência
        if let Ok(token) = std::env::var("CLICKUP_API_TOKEN") {
            builder = builder.set_override("clickup.token", token)?;
        }
        // CLICKUP_WORKSPACE_ID com fallback para o nome antigo CLICKUP_TEAM_ID
        if let Ok(workspace_id) =
            std::env::var("CLICKUP_WORKSPACE_ID").or_else(|_| std::env::var("CLICKUP_TEAM_ID"))
        {
            builder = builder.set_override("clickup.workspace_id", workspace_id)?;
        }

        Self::from_config(builder.build()?)
    }

    /// Deserializa e valida uma configuração já montada
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clickup.token.trim().is_empty() {
            return Err(ConfigError::Message(
                "clickup.token não configurado (defina CLICKUP_API_TOKEN)".into(),
            ));
        }
        if self.rate_limit.max_attempts == 0 {
            return Err(ConfigError::Message(
                "rate_limit.max_attempts deve ser >= 1".into(),
            ));
        }
        if self.rate_limit.multiplier <= 1.0 {
            return Err(ConfigError::Message(
                "rate_limit.multiplier deve ser > 1.0".into(),
            ));
        }
        if self.rate_limit.max_delay_ms < self.rate_limit.base_delay_ms {
            return Err(ConfigError::Message(
                "rate_limit.max_delay_ms deve ser >= rate_limit.base_delay_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.rate_limit.max_attempts,
            base_delay: Duration::from_millis(self.rate_limit.base_delay_ms),
            multiplier: self.rate_limit.multiplier,
            max_delay: Duration::from_millis(self.rate_limit.max_delay_ms),
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            min_spacing: Duration::from_millis(self.rate_limit.min_spacing_ms),
            retry: self.retry_policy(),
            ..ExecutorConfig::default()
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.clickup.base_url.clone(),
            total_timeout: Duration::from_secs(self.clickup.timeout_secs),
            connect_timeout: Duration::from_secs(self.clickup.connect_timeout_secs),
            executor: self.executor_config(),
        }
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            hierarchy: Duration::from_secs(self.cache.hierarchy_ttl_secs),
            members: Duration::from_secs(self.cache.members_ttl_secs),
            tags: Duration::from_secs(self.cache.tags_ttl_secs),
            custom_fields: Duration::from_secs(self.cache.custom_fields_ttl_secs),
        }
    }
}
