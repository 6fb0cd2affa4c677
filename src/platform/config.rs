//! Platform configuration: a TOML file (default `configs/orchestrator.toml`)
//! layered with `ORCHESTRATOR__`-prefixed environment overrides, following
//! the `config` crate usage this module inherited from its predecessor.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "configs/orchestrator.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub metadata: MetadataSettings,
    pub observability: ObservabilitySettings,
    pub broker: BrokerSettings,
    pub retry: RetrySettings,
    pub txlog: TxLogSettings,
    pub hooks: HooksSettings,
    pub admin: AdminSettings,
    pub agents: HashMap<String, AgentSettings>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            metadata: MetadataSettings::default(),
            observability: ObservabilitySettings::default(),
            broker: BrokerSettings::default(),
            retry: RetrySettings::default(),
            txlog: TxLogSettings::default(),
            hooks: HooksSettings::default(),
            admin: AdminSettings::default(),
            agents: HashMap::new(),
        }
    }
}

impl PlatformConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_path(None::<PathBuf>)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            File::from(PathBuf::from(DEFAULT_CONFIG_PATH))
                .format(FileFormat::Toml)
                .required(false),
        );

        if let Some(path) = path {
            builder = builder.add_source(File::from(path.as_ref()).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(Environment::with_prefix("ORCHESTRATOR").separator("__"));

        let config = builder.build()?;
        let platform: PlatformConfig = config.try_deserialize().context("invalid platform configuration")?;
        platform.validate()?;
        Ok(platform)
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.broker.url).with_context(|| format!("invalid broker url: {}", self.broker.url))?;
        Ok(())
    }

    /// Converts the retry section into the `orchestrator-retry` crate's
    /// native config type, translating second-granularity durations.
    pub fn retry_config(&self) -> orchestrator_retry::RetryConfig {
        orchestrator_retry::RetryConfig {
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_secs(self.retry.max_delay_seconds),
            processing_interval: Duration::from_secs(self.retry.processing_interval_seconds),
            circuit_breaker_threshold: self.retry.circuit_breaker_threshold,
            circuit_breaker_cooldown: Duration::from_secs(self.retry.circuit_breaker_cooldown_seconds),
            dlq_ttl: Duration::from_secs(self.retry.dlq_ttl_seconds),
            dlq_housekeeping_interval: Duration::from_secs(self.retry.dlq_housekeeping_interval_seconds),
            pattern_analysis_interval: Duration::from_secs(self.retry.pattern_analysis_interval_seconds),
            pattern_min_attempts: self.retry.pattern_min_attempts,
            pattern_min_successes: self.retry.pattern_min_successes,
            pattern_low_success_rate: self.retry.pattern_low_success_rate,
            pattern_slow_recovery: Duration::from_secs(self.retry.pattern_slow_recovery_seconds),
        }
    }

    pub fn txlog_config(&self) -> orchestrator_txlog::TxLogConfig {
        orchestrator_txlog::TxLogConfig {
            flush_interval: Duration::from_secs(self.txlog.flush_interval_seconds),
            max_batch_size: self.txlog.max_batch_size,
            retention_days: self.txlog.retention_days,
            file_sink_dir: self.txlog.file_sink_dir.clone().map(PathBuf::from),
            subscribe_patterns: orchestrator_txlog::TxLogConfig::default().subscribe_patterns,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    pub name: String,
    pub environment: String,
    pub cluster: String,
    pub node: String,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            name: "orchestrator".to_string(),
            environment: "development".to_string(),
            cluster: "local".to_string(),
            node: "node-0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    pub log_level: String,
    pub metrics_port: u16,
    pub enable_metrics: bool,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self { log_level: "info".to_string(), metrics_port: 9090, enable_metrics: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub url: String,
    /// When true, an in-process `InMemoryBroker` is used instead of
    /// connecting to Redis — for local development and integration tests
    /// that exercise the full binary without external infrastructure.
    pub in_memory: bool,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self { url: "redis://127.0.0.1:6379".to_string(), in_memory: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub base_delay_ms: u64,
    pub max_delay_seconds: u64,
    pub processing_interval_seconds: u64,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown_seconds: u64,
    pub dlq_ttl_seconds: u64,
    pub dlq_housekeeping_interval_seconds: u64,
    pub pattern_analysis_interval_seconds: u64,
    pub pattern_min_attempts: u32,
    pub pattern_min_successes: u32,
    pub pattern_low_success_rate: f64,
    pub pattern_slow_recovery_seconds: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = orchestrator_retry::RetryConfig::default();
        Self {
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            max_delay_seconds: defaults.max_delay.as_secs(),
            processing_interval_seconds: defaults.processing_interval.as_secs(),
            circuit_breaker_threshold: defaults.circuit_breaker_threshold,
            circuit_breaker_cooldown_seconds: defaults.circuit_breaker_cooldown.as_secs(),
            dlq_ttl_seconds: defaults.dlq_ttl.as_secs(),
            dlq_housekeeping_interval_seconds: defaults.dlq_housekeeping_interval.as_secs(),
            pattern_analysis_interval_seconds: defaults.pattern_analysis_interval.as_secs(),
            pattern_min_attempts: defaults.pattern_min_attempts,
            pattern_min_successes: defaults.pattern_min_successes,
            pattern_low_success_rate: defaults.pattern_low_success_rate,
            pattern_slow_recovery_seconds: defaults.pattern_slow_recovery.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TxLogSettings {
    pub flush_interval_seconds: u64,
    pub max_batch_size: usize,
    pub retention_days: u32,
    pub file_sink_dir: Option<String>,
}

impl Default for TxLogSettings {
    fn default() -> Self {
        let defaults = orchestrator_txlog::TxLogConfig::default();
        Self {
            flush_interval_seconds: defaults.flush_interval.as_secs(),
            max_batch_size: defaults.max_batch_size,
            retention_days: defaults.retention_days,
            file_sink_dir: Some("logs/txlog".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksSettings {
    pub enabled: bool,
    /// Additional plugin hook ids to load beyond the built-ins, via a
    /// configured list rather than filesystem discovery. No plugin loader
    /// ships here — this is the seam a deployment-specific binary would
    /// read before calling `HookRegistry::register`.
    pub plugins: Vec<String>,
}

impl Default for HooksSettings {
    fn default() -> Self {
        Self { enabled: true, plugins: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
    pub bind_address: String,
    pub enabled: bool,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:8080".to_string(), enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub model: String,
    pub capabilities: Vec<String>,
    pub token_limit: usize,
    pub cost_per_token: f64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self { model: "unspecified".to_string(), capabilities: Vec::new(), token_limit: 8192, cost_per_token: 0.0 }
    }
}

impl AgentSettings {
    pub fn to_agent(&self, id: &str) -> orchestrator_core::Agent {
        let mut agent = orchestrator_core::Agent::new(id, self.model.clone())
            .with_capabilities(self.capabilities.iter().cloned());
        agent.token_limit = self.token_limit;
        agent.cost_per_token = self.cost_per_token;
        agent.status = orchestrator_core::AgentStatus::Idle;
        agent
    }
}
