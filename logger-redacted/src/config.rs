// Logger configuration
use serde::{Deserialize, Serialize};

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines for development
    Pretty,
    /// One JSON object per event for production
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub log_level: String,
    pub format: LogFormat,
    /// Extra `EnvFilter` directives appended after the default level
    pub directives: Vec<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
            directives: Vec::new(),
        }
    }
}

impl LoggerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let log_level = std::env::var("CARESENSE_LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string());

        let format = match std::env::var("CARESENSE_LOG_FORMAT") {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Self {
            log_level,
            format,
            directives: Vec::new(),
        }
    }

    pub fn verbose(mut self) -> Self {
        self.log_level = "debug".to_string();
        self
    }

    pub fn filter_directives(&self) -> String {
        let mut parts = vec![self.log_level.clone()];
        parts.extend(self.directives.iter().cloned());
        parts.join(",")
    }
}
