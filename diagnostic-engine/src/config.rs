use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// Environment variable prefix, e.g. `CARESENSE_IMAGE_TIMEOUT_MS`
pub const ENV_PREFIX: &str = "CARESENSE";

/// Inference engine configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Confidence floor applied to every candidate
    pub min_confidence: u8,
    /// Confidence cap; headroom below 100 signals inherent uncertainty
    pub max_confidence: u8,
    /// Diagnosis confidence at which it becomes the overall assessment
    pub assessment_confidence_threshold: u8,
    /// Risk percentage at which a category counts as elevated
    pub elevated_risk_threshold: u8,
    /// Risk percentage below which a category is banded low
    pub low_risk_threshold: u8,
    /// Deadline for one image classification call
    pub image_timeout_ms: u64,
    /// Number of ranked candidates kept in the differential
    pub max_differential: usize,
    pub max_symptom_text_len: usize,
    pub max_age: u32,
    /// Knowledge base file; the embedded default is used when unset
    pub knowledge_base_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0,
            max_confidence: 98,
            assessment_confidence_threshold: 60,
            elevated_risk_threshold: 25,
            low_risk_threshold: 10,
            image_timeout_ms: 5_000,
            max_differential: 5,
            max_symptom_text_len: 4_096,
            max_age: 150,
            knowledge_base_path: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> EngineResult<Self> {
        Self::load(None)
    }

    /// Defaults, then the optional file (YAML, TOML or JSON), then `CARESENSE_*` variables
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| EngineError::Config(format!("failed to read configuration: {}", e)))?;

        let config: EngineConfig = settings
            .try_deserialize()
            .map_err(|e| EngineError::Config(format!("invalid configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.max_confidence > 100 {
            return Err(EngineError::Config(format!(
                "max_confidence {} exceeds 100",
                self.max_confidence
            )));
        }
        if self.min_confidence > self.max_confidence {
            return Err(EngineError::Config(format!(
                "min_confidence {} exceeds max_confidence {}",
                self.min_confidence, self.max_confidence
            )));
        }
        if self.assessment_confidence_threshold > 100 || self.elevated_risk_threshold > 100 {
            return Err(EngineError::Config("thresholds must be within 0-100".to_string()));
        }
        if self.low_risk_threshold > self.elevated_risk_threshold {
            return Err(EngineError::Config(format!(
                "low_risk_threshold {} exceeds elevated_risk_threshold {}",
                self.low_risk_threshold, self.elevated_risk_threshold
            )));
        }
        if self.image_timeout_ms == 0 {
            return Err(EngineError::Config("image_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }
}
