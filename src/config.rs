//! Planner and executor configuration.
//!
//! ```yaml
//! query_planning:
//!   cache_capacity: 512
//!   coalesce_sibling_steps: true
//! execution:
//!   subgraph_timeout: 30s
//!   max_concurrent_steps: 16
//! ```

use crate::execution::ExecutorConfig;
use crate::query_plan::query_planner::QueryPlannerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("could not parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("could not parse JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Every key is optional and falls back to its default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    pub query_planning: QueryPlannerConfig,
    pub execution: ExecutorConfig,
}

impl Configuration {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigurationError> {
        let configuration: Configuration = serde_yaml::from_str(yaml)?;
        configuration.validate()
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let configuration: Configuration = serde_json::from_str(json)?;
        configuration.validate()
    }

    fn validate(self) -> Result<Self, ConfigurationError> {
        if self.execution.max_concurrent_steps == 0 {
            return Err(ConfigurationError::InvalidValue {
                key: "execution.max_concurrent_steps",
                message: "must be at least 1".to_string(),
            });
        }
        if self.execution.subgraph_timeout.is_zero() {
            return Err(ConfigurationError::InvalidValue {
                key: "execution.subgraph_timeout",
                message: "must not be zero".to_string(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(Configuration::from_yaml("{}").unwrap(), Configuration::default());
        let defaults = Configuration::default();
        assert_eq!(defaults.query_planning.cache_capacity.get(), 512);
        assert!(defaults.query_planning.coalesce_sibling_steps);
        assert_eq!(defaults.execution.subgraph_timeout, Duration::from_secs(30));
        assert_eq!(defaults.execution.max_concurrent_steps, 16);
    }

    #[test]
    fn parses_human_readable_timeouts() {
        let configuration = Configuration::from_yaml(
            "execution:\n  subgraph_timeout: 1500ms\n  max_concurrent_steps: 4\n",
        )
        .unwrap();
        assert_eq!(
            configuration.execution.subgraph_timeout,
            Duration::from_millis(1500)
        );
        assert_eq!(configuration.execution.max_concurrent_steps, 4);
        assert!(configuration.query_planning.coalesce_sibling_steps);
    }

    #[test]
    fn rejects_unknown_keys_and_invalid_values() {
        assert!(matches!(
            Configuration::from_json(r#"{"query_planning": {"cache_size": 3}}"#),
            Err(ConfigurationError::Json(_))
        ));
        assert!(matches!(
            Configuration::from_yaml("execution:\n  max_concurrent_steps: 0\n"),
            Err(ConfigurationError::InvalidValue {
                key: "execution.max_concurrent_steps",
                ..
            })
        ));
        assert!(matches!(
            Configuration::from_yaml("query_planning:\n  cache_capacity: 0\n"),
            Err(ConfigurationError::Yaml(_))
        ));
    }
}
