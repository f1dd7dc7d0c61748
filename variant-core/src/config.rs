use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Batch processor configuration (spec §4.2). All durations are
/// represented in seconds/milliseconds in config (serde-friendly) and
/// converted to `Duration` for use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub max_batch_size: usize,
    pub max_wait_time_secs: f64,
    pub max_workers: usize,
    pub max_retries: u32,
    pub vep_timeout_secs: f64,
    pub terminal_retention_secs: f64,
    pub vep_endpoint: String,
    /// Path to the serialized ML model (spec §6). Absence is a degraded
    /// mode (score = null via `NullScorer`), never a startup failure.
    pub ml_model_path: Option<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 200,
            max_wait_time_secs: 5.0,
            max_workers: 3,
            max_retries: 3,
            vep_timeout_secs: 30.0,
            // Longer than a typical poll interval (spec §9 Open Question 3).
            terminal_retention_secs: 10.0,
            vep_endpoint: "http://localhost:8000/vep/batch".to_string(),
            ml_model_path: None,
        }
    }
}

impl BatchConfig {
    pub fn max_wait_time(&self) -> Duration {
        Duration::from_secs_f64(self.max_wait_time_secs)
    }

    pub fn vep_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.vep_timeout_secs)
    }

    pub fn terminal_retention(&self) -> Duration {
        Duration::from_secs_f64(self.terminal_retention_secs)
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("VariantAnnotator.toml"))
            .merge(Env::prefixed("VARIANT_"))
    }

    pub fn load() -> figment::Result<Self> {
        Self::figment().extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = BatchConfig::default();
        assert_eq!(config.max_batch_size, 200);
        assert_eq!(config.max_wait_time(), Duration::from_secs(5));
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn figment_falls_back_to_defaults_with_no_toml_or_env() {
        let config: BatchConfig = Figment::from(Serialized::defaults(BatchConfig::default()))
            .extract()
            .unwrap();
        assert_eq!(config, BatchConfig::default());
    }
}
