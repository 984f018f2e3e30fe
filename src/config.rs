use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,
    /// Search backend configuration
    pub search: SearchConfig,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Where exported result lists are written
    pub export_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the search service; `/search` is appended.
    pub base_url: String,
    /// Fixed result cap sent as `k`.
    pub result_limit: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            result_limit: 10,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for summarization
    pub chat_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Longest silence tolerated between two chunks, in seconds
    pub idle_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            api_key: None,
            idle_timeout_secs: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9100".to_string(),
            search: SearchConfig::default(),
            llm: LlmConfig::default(),
            export_dir: PathBuf::from("./exports"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unparseable numbers keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("DIGEST_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(dir) = lookup("DIGEST_EXPORT_DIR") {
            config.export_dir = PathBuf::from(dir);
        }

        // Search backend
        if let Some(url) = lookup("SEARCH_BASE_URL") {
            config.search.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(val) = lookup("SEARCH_RESULT_LIMIT") {
            if let Ok(v) = val.parse::<usize>() {
                if v > 0 {
                    config.search.result_limit = v;
                }
            }
        }
        if let Some(val) = lookup("SEARCH_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.search.timeout_secs = v;
            }
        }

        // LLM provider
        if let Some(provider) = lookup("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Some(key) = lookup("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Some(val) = lookup("LLM_IDLE_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.llm.idle_timeout_secs = v.min(300); // Cap at 5 minutes
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.bind_addr, "127.0.0.1:9100");
        assert_eq!(config.search.result_limit, 10);
        assert_eq!(config.llm.provider, "ollama");
    }

    #[test]
    fn test_overrides_and_trailing_slash() {
        let config = Config::from_lookup(lookup_from(&[
            ("SEARCH_BASE_URL", "http://search.local/"),
            ("SEARCH_RESULT_LIMIT", "25"),
            ("LLM_PROVIDER", "openai"),
            ("LLM_API_KEY", "sk-test"),
        ]));
        assert_eq!(config.search.base_url, "http://search.local");
        assert_eq!(config.search.result_limit, 25);
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_bad_numbers_keep_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("SEARCH_RESULT_LIMIT", "lots"),
            ("SEARCH_TIMEOUT_SECS", "-1"),
        ]));
        assert_eq!(config.search.result_limit, 10);
        assert_eq!(config.search.timeout_secs, 15);
    }

    #[test]
    fn test_zero_limit_ignored_and_idle_timeout_capped() {
        let config = Config::from_lookup(lookup_from(&[
            ("SEARCH_RESULT_LIMIT", "0"),
            ("LLM_IDLE_TIMEOUT_SECS", "9000"),
        ]));
        assert_eq!(config.search.result_limit, 10);
        assert_eq!(config.llm.idle_timeout_secs, 300);
    }
}
