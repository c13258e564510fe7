//! Configuration system (layered: defaults < TOML < env).

use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentDescriptor, BehaviorKind};
use crate::error::ParleyError;

/// Global default config (lazy-initialized from env).
static DEFAULT_CONFIG: OnceLock<ParleyConfig> = OnceLock::new();

pub const DEFAULT_MAX_ITERATIONS: usize = 40;
pub const DEFAULT_TERMINATION_PHRASE: &str = "TERMINATE";
pub const DEFAULT_TEAM_MAX_MESSAGES: usize = 20;
pub const DEFAULT_CODE_TIMEOUT_SECS: u64 = 30;

const MAX_ITERATIONS_ENV: &str = "PARLEY_MAX_ITERATIONS";
const TERMINATION_PHRASE_ENV: &str = "PARLEY_TERMINATION_PHRASE";
const TEAM_MAX_MESSAGES_ENV: &str = "PARLEY_TEAM_MAX_MESSAGES";
const ROUND_PAUSE_MS_ENV: &str = "PARLEY_ROUND_PAUSE_MS";
const CODE_TIMEOUT_SECS_ENV: &str = "PARLEY_CODE_TIMEOUT_SECS";

/// Runtime defaults applied to agents built by the factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    /// Safety cap on turn-loop rounds.
    pub max_iterations: usize,
    /// Sentinel phrase that ends a loop.
    pub termination_phrase: String,
    /// Message cap for one team invocation.
    pub team_max_messages: usize,
    /// Pause between rounds; zero means a bare cooperative yield.
    pub round_pause_ms: u64,
    /// Timeout for one code-executor run.
    pub code_timeout_secs: u64,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            termination_phrase: DEFAULT_TERMINATION_PHRASE.to_string(),
            team_max_messages: DEFAULT_TEAM_MAX_MESSAGES,
            round_pause_ms: 0,
            code_timeout_secs: DEFAULT_CODE_TIMEOUT_SECS,
        }
    }
}

impl ParleyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ParleyError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| ParleyError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables (`PARLEY_*`), reading `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::default().with_env_overrides()
    }

    /// Apply `PARLEY_*` overrides on top of this config. Unparseable values
    /// are ignored with a warning.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(value) = env_parse::<usize>(MAX_ITERATIONS_ENV).filter(|v| *v > 0) {
            self.max_iterations = value;
        }
        if let Ok(value) = std::env::var(TERMINATION_PHRASE_ENV) {
            if !value.trim().is_empty() {
                self.termination_phrase = value;
            }
        }
        if let Some(value) = env_parse::<usize>(TEAM_MAX_MESSAGES_ENV).filter(|v| *v > 0) {
            self.team_max_messages = value;
        }
        if let Some(value) = env_parse::<u64>(ROUND_PAUSE_MS_ENV) {
            self.round_pause_ms = value;
        }
        if let Some(value) = env_parse::<u64>(CODE_TIMEOUT_SECS_ENV).filter(|v| *v > 0) {
            self.code_timeout_secs = value;
        }
        self
    }

    /// Get (or create) the global default config.
    pub fn global() -> &'static ParleyConfig {
        DEFAULT_CONFIG.get_or_init(Self::from_env)
    }

    pub fn validate(&self) -> Result<(), ParleyError> {
        if self.max_iterations == 0 {
            return Err(ParleyError::Configuration(
                "max_iterations must be at least 1".into(),
            ));
        }
        if self.termination_phrase.trim().is_empty() {
            return Err(ParleyError::Configuration(
                "termination_phrase must not be empty".into(),
            ));
        }
        if self.team_max_messages == 0 {
            return Err(ParleyError::Configuration(
                "team_max_messages must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Fill omitted descriptor fields with this config's defaults,
    /// recursing into team members.
    pub fn apply_defaults(&self, descriptor: &mut AgentDescriptor) {
        descriptor.max_iterations.get_or_insert(self.max_iterations);
        descriptor
            .termination_phrase
            .get_or_insert_with(|| self.termination_phrase.clone());
        if let BehaviorKind::Team(team) = &mut descriptor.kind {
            team.max_messages.get_or_insert(self.team_max_messages);
            for member in &mut team.agents {
                self.apply_defaults(member);
            }
        }
    }

    pub fn round_pause(&self) -> Duration {
        Duration::from_millis(self.round_pause_ms)
    }

    pub fn code_timeout(&self) -> Duration {
        Duration::from_secs(self.code_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable config override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ParleyConfig::default();
        assert_eq!(config.max_iterations, 40);
        assert_eq!(config.termination_phrase, "TERMINATE");
        assert_eq!(config.team_max_messages, 20);
        assert_eq!(config.round_pause(), Duration::ZERO);
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let config = ParleyConfig::from_toml_str(
            r#"
            max_iterations = 5
            termination_phrase = "DONE"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.termination_phrase, "DONE");
        assert_eq!(config.team_max_messages, DEFAULT_TEAM_MAX_MESSAGES);
    }

    #[test]
    fn apply_defaults_fills_nested_members() {
        use crate::agent::TeamDescriptor;

        let member = AgentDescriptor::builder()
            .name("a")
            .max_iterations(3)
            .kind(BehaviorKind::Looping)
            .build();
        let mut team = AgentDescriptor::builder()
            .name("t")
            .kind(BehaviorKind::Team(
                TeamDescriptor::builder()
                    .agents(vec![member])
                    .orchestrator("a")
                    .build(),
            ))
            .build();

        ParleyConfig::default().apply_defaults(&mut team);

        assert_eq!(team.max_iterations, Some(DEFAULT_MAX_ITERATIONS));
        let inner = team.team().unwrap();
        assert_eq!(inner.max_messages, Some(DEFAULT_TEAM_MAX_MESSAGES));
        assert_eq!(inner.agents[0].max_iterations, Some(3));
        assert_eq!(inner.agents[0].termination_phrase.as_deref(), Some("TERMINATE"));
    }

    #[test]
    fn toml_rejects_zero_cap() {
        let err = ParleyConfig::from_toml_str("max_iterations = 0").unwrap_err();
        assert!(matches!(err, ParleyError::Configuration(_)));
    }

    #[test]
    fn toml_syntax_errors_are_configuration_errors() {
        let err = ParleyConfig::from_toml_str("max_iterations = ").unwrap_err();
        assert!(matches!(err, ParleyError::Configuration(_)));
    }
}
