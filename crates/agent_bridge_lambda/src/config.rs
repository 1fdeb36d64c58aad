use std::time::Duration;

use agent_bridge_core::poll::{
    PollPolicy, PollPolicyError, DEFAULT_INITIAL_INTERVAL, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_INTERVAL,
};
use agent_bridge_core::query::output_location;

pub const OUTPUT_BUCKET_VAR: &str = "athena_output_bucket";
pub const POLL_INITIAL_MS_VAR: &str = "QUERY_POLL_INITIAL_MS";
pub const POLL_MAX_MS_VAR: &str = "QUERY_POLL_MAX_MS";
pub const POLL_MAX_ATTEMPTS_VAR: &str = "QUERY_POLL_MAX_ATTEMPTS";
pub const AGENT_ID_VAR: &str = "AGENT_ID";
pub const AGENT_ALIAS_ID_VAR: &str = "AGENT_ALIAS_ID";
pub const WEBSOCKET_CALLBACK_URL_VAR: &str = "WEBSOCKET_CALLBACK_URL";
pub const REGION_VAR: &str = "AWS_REGION";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(&'static str),
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
    #[error("invalid query poll policy: {0}")]
    PollPolicy(#[from] PollPolicyError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExecutorConfig {
    pub output_bucket: String,
    pub poll_policy: PollPolicy,
}

impl QueryExecutorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let output_bucket = required(&lookup, OUTPUT_BUCKET_VAR)?;
        let initial_ms = optional_number(&lookup, POLL_INITIAL_MS_VAR)?;
        let max_ms = optional_number(&lookup, POLL_MAX_MS_VAR)?;
        let max_attempts = optional_number(&lookup, POLL_MAX_ATTEMPTS_VAR)?;

        // a lone override drags the other bound's default along with it
        let (initial_interval, max_interval) = match (
            initial_ms.map(Duration::from_millis),
            max_ms.map(Duration::from_millis),
        ) {
            (Some(initial), Some(max)) => (initial, max),
            (Some(initial), None) => (initial, DEFAULT_MAX_INTERVAL.max(initial)),
            (None, Some(max)) => (DEFAULT_INITIAL_INTERVAL.min(max), max),
            (None, None) => (DEFAULT_INITIAL_INTERVAL, DEFAULT_MAX_INTERVAL),
        };
        let poll_policy = PollPolicy {
            initial_interval,
            max_interval,
            max_attempts: max_attempts
                .map(|value| u32::try_from(value).unwrap_or(u32::MAX))
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            ..PollPolicy::default()
        };
        poll_policy.validate()?;

        Ok(Self {
            output_bucket,
            poll_policy,
        })
    }

    pub fn output_location(&self) -> String {
        output_location(&self.output_bucket)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRelayConfig {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub websocket_callback_url: String,
}

impl AgentRelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            agent_id: required(&lookup, AGENT_ID_VAR)?,
            agent_alias_id: required(&lookup, AGENT_ALIAS_ID_VAR)?,
            websocket_callback_url: required(&lookup, WEBSOCKET_CALLBACK_URL_VAR)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexProvisionerConfig {
    pub region: String,
}

impl IndexProvisionerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            region: required(&lookup, REGION_VAR)?,
        })
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn optional_number(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<u64>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(ConfigError::InvalidNumber { name, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn query_config_requires_output_bucket() {
        let error = QueryExecutorConfig::from_lookup(lookup_from(&[]))
            .expect_err("missing bucket should fail");
        assert_eq!(error, ConfigError::Missing("athena_output_bucket"));
        assert_eq!(error.to_string(), "athena_output_bucket must be configured");
    }

    #[test]
    fn query_config_defaults_to_bounded_backoff() {
        let config = QueryExecutorConfig::from_lookup(lookup_from(&[(
            "athena_output_bucket",
            "analytics-results",
        )]))
        .expect("config should load");

        assert_eq!(config.poll_policy, PollPolicy::default());
        assert_eq!(
            config.output_location(),
            "s3://analytics-results/athena/output/"
        );
    }

    #[test]
    fn query_config_reads_poll_overrides() {
        let config = QueryExecutorConfig::from_lookup(lookup_from(&[
            ("athena_output_bucket", "b"),
            ("QUERY_POLL_INITIAL_MS", "200"),
            ("QUERY_POLL_MAX_MS", "1000"),
            ("QUERY_POLL_MAX_ATTEMPTS", "30"),
        ]))
        .expect("config should load");

        assert_eq!(
            config.poll_policy.initial_interval,
            Duration::from_millis(200)
        );
        assert_eq!(config.poll_policy.max_interval, Duration::from_secs(1));
        assert_eq!(config.poll_policy.max_attempts, 30);
    }

    #[test]
    fn query_config_rejects_zero_and_garbage_numbers() {
        let zero = QueryExecutorConfig::from_lookup(lookup_from(&[
            ("athena_output_bucket", "b"),
            ("QUERY_POLL_MAX_ATTEMPTS", "0"),
        ]))
        .expect_err("zero attempts should fail");
        assert!(matches!(
            zero,
            ConfigError::InvalidNumber {
                name: "QUERY_POLL_MAX_ATTEMPTS",
                ..
            }
        ));

        let garbage = QueryExecutorConfig::from_lookup(lookup_from(&[
            ("athena_output_bucket", "b"),
            ("QUERY_POLL_INITIAL_MS", "soon"),
        ]))
        .expect_err("non-numeric interval should fail");
        assert_eq!(
            garbage.to_string(),
            "QUERY_POLL_INITIAL_MS must be a positive integer, got 'soon'"
        );
    }

    #[test]
    fn lone_interval_override_adjusts_the_other_bound() {
        let raised = QueryExecutorConfig::from_lookup(lookup_from(&[
            ("athena_output_bucket", "b"),
            ("QUERY_POLL_INITIAL_MS", "10000"),
        ]))
        .expect("initial above default cap should raise the cap");
        assert_eq!(raised.poll_policy.initial_interval, Duration::from_secs(10));
        assert_eq!(raised.poll_policy.max_interval, Duration::from_secs(10));

        let lowered = QueryExecutorConfig::from_lookup(lookup_from(&[
            ("athena_output_bucket", "b"),
            ("QUERY_POLL_MAX_MS", "500"),
        ]))
        .expect("cap below default initial should lower the initial interval");
        assert_eq!(
            lowered.poll_policy.initial_interval,
            Duration::from_millis(500)
        );
        assert_eq!(lowered.poll_policy.max_interval, Duration::from_millis(500));
    }

    #[test]
    fn query_config_rejects_waits_longer_than_an_invocation() {
        let error = QueryExecutorConfig::from_lookup(lookup_from(&[
            ("athena_output_bucket", "b"),
            ("QUERY_POLL_MAX_ATTEMPTS", "120"),
        ]))
        .expect_err("935s worst case should fail");
        assert!(matches!(
            error,
            ConfigError::PollPolicy(PollPolicyError::ExceedsWaitBudget { .. })
        ));
    }

    #[test]
    fn query_config_rejects_inverted_intervals() {
        let error = QueryExecutorConfig::from_lookup(lookup_from(&[
            ("athena_output_bucket", "b"),
            ("QUERY_POLL_INITIAL_MS", "5000"),
            ("QUERY_POLL_MAX_MS", "1000"),
        ]))
        .expect_err("initial above max should fail");
        assert!(matches!(error, ConfigError::PollPolicy(_)));
    }

    #[test]
    fn relay_config_requires_every_variable() {
        let error = AgentRelayConfig::from_lookup(lookup_from(&[
            ("AGENT_ID", "agent"),
            ("AGENT_ALIAS_ID", "  "),
        ]))
        .expect_err("blank alias should fail");
        assert_eq!(error, ConfigError::Missing("AGENT_ALIAS_ID"));

        let config = AgentRelayConfig::from_lookup(lookup_from(&[
            ("AGENT_ID", "agent"),
            ("AGENT_ALIAS_ID", "alias"),
            ("WEBSOCKET_CALLBACK_URL", "https://abc.execute-api.us-east-1.amazonaws.com/prod"),
        ]))
        .expect("config should load");
        assert_eq!(config.agent_alias_id, "alias");
    }

    #[test]
    fn index_config_requires_region() {
        assert_eq!(
            IndexProvisionerConfig::from_lookup(lookup_from(&[])),
            Err(ConfigError::Missing("AWS_REGION"))
        );
    }
}
