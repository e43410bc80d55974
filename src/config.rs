use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::PromptQaError;

pub const DEFAULT_MAX_STEPS: u32 = 12;
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_CONFIG_PATH: &str = ".promptqa.yaml";

/// Wait before a single `element_not_found` retry, in milliseconds.
pub const RETRY_WAIT_MS: u64 = 1_000;
/// Cap on steps spent in the optional login sub-loop (both strategies).
pub const LOGIN_MAX_STEPS: u32 = 5;
/// Cap on steps spent in the agent loop's main observe-decide-act sub-loop.
pub const V2_MAX_STEPS: u32 = 20;
/// How long the plan-once loop waits for network-idle after login, in ms.
pub const LOGIN_NETWORK_IDLE_WAIT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    Anthropic,
    Openai,
    Mock,
}

impl std::str::FromStr for LlmProviderKind {
    type Err = PromptQaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::Openai),
            "mock" => Ok(Self::Mock),
            other => Err(PromptQaError::config(format!("unknown LLM_PROVIDER '{other}'"))),
        }
    }
}

impl Default for LlmProviderKind {
    fn default() -> Self {
        Self::Anthropic
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(default, rename = "loginPrompt", skip_serializing_if = "Option::is_none")]
    pub login_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Loaded and merged configuration for one run. Deserialized from YAML or
/// JSON, then overridden by environment variables and finally by CLI flags
/// — in that priority order, with CLI flags always winning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "maxSteps", default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<LlmProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

fn default_max_steps() -> u32 {
    DEFAULT_MAX_STEPS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Config {
    /// A minimal config built directly from CLI flags, for the `test`
    /// subcommand, which doesn't require a config file to exist.
    pub fn from_single_test(base_url: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_steps: DEFAULT_MAX_STEPS,
            headless: false,
            timeout: DEFAULT_TIMEOUT_SECS,
            provider: None,
            model: None,
            auth: AuthConfig::default(),
            tests: vec![TestCase { name: "default".to_string(), prompt: prompt.into(), url: None }],
        }
    }

    pub fn load(path: &Path) -> Result<Self, PromptQaError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| PromptQaError::config(format!("failed to read {}: {err}", path.display())))?;

        let config: Config = if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            serde_json::from_str(&raw)
                .map_err(|err| PromptQaError::config(format!("invalid JSON config: {err}")))?
        } else {
            serde_yaml::from_str(&raw)
                .map_err(|err| PromptQaError::config(format!("invalid YAML config: {err}")))?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PromptQaError> {
        if url::Url::parse(&self.base_url).is_err() {
            return Err(PromptQaError::config(format!("baseUrl is not a valid URL: {}", self.base_url)));
        }
        if self.max_steps == 0 {
            return Err(PromptQaError::config("maxSteps must be greater than zero"));
        }
        if self.timeout == 0 {
            return Err(PromptQaError::config("timeout must be greater than zero seconds"));
        }
        for test in &self.tests {
            if test.name.trim().is_empty() {
                return Err(PromptQaError::config("every test entry requires a non-empty name"));
            }
            if test.prompt.trim().is_empty() {
                return Err(PromptQaError::config(format!("test '{}' has an empty prompt", test.name)));
            }
        }
        Ok(())
    }

    /// Provider resolution order: explicit config value, then
    /// `LLM_PROVIDER`, then the anthropic default.
    pub fn resolve_provider(&self) -> Result<LlmProviderKind, PromptQaError> {
        if let Some(provider) = self.provider {
            return Ok(provider);
        }
        match std::env::var("LLM_PROVIDER") {
            Ok(value) => value.parse(),
            Err(_) => Ok(LlmProviderKind::default()),
        }
    }

    pub fn resolve_test(&self, name: Option<&str>) -> Result<&TestCase, PromptQaError> {
        match name {
            Some(name) => self
                .tests
                .iter()
                .find(|test| test.name == name)
                .ok_or_else(|| PromptQaError::config(format!("no test named '{name}' in config"))),
            None => self.tests.first().ok_or_else(|| PromptQaError::config("config has no tests defined")),
        }
    }

    pub fn test_url(&self, test: &TestCase) -> &str {
        test.url.as_deref().unwrap_or(&self.base_url)
    }
}

/// Parses a `"name=value; name2=value2"` cookie string into CDP-shaped
/// `(name, value)` pairs. Malformed pairs (missing `=`) raise an error.
pub fn parse_cookie_string(raw: &str) -> Result<Vec<(String, String)>, PromptQaError> {
    raw.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| PromptQaError::config(format!("malformed cookie pair: '{pair}'")))?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_base_url() {
        let config = Config::from_single_test("not a url", "check things");
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_cookie_pairs() {
        let pairs = parse_cookie_string("a=1; b=2").unwrap();
        assert_eq!(pairs, vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]);
    }

    #[test]
    fn rejects_malformed_cookie_pair() {
        assert!(parse_cookie_string("a=1; nocolon").is_err());
    }
}
