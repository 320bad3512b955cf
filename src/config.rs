use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{QnaError, Result};

/// Default embedding script, run from the working directory
pub const DEFAULT_EMBED_COMMAND: &str = "python embedding.py";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text";

/// Which embedding backend to call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderChoice {
    Command,
    Ollama,
    OpenAI,
    Hash,
}

impl FromStr for ProviderChoice {
    type Err = QnaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "command" => Ok(Self::Command),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            other => Err(QnaError::Config(format!(
                "Unknown embedding provider: {} (expected command, ollama, openai or hash)",
                other
            ))),
        }
    }
}

/// Values given on the command line; they win over the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub store: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// JSON Lines file holding the records
    pub store_path: PathBuf,
    pub provider: ProviderChoice,
    /// Program and leading arguments; the text is appended as the last argument
    pub embed_command: Vec<String>,
    /// Expected embedding dimension, if pinned
    pub dimension: Option<usize>,
    pub timeout: Duration,
    pub ollama_endpoint: String,
    pub ollama_model: String,
    pub openai_api_key: Option<String>,
}

impl Config {
    pub fn load(overrides: &Overrides) -> Result<Self> {
        Self::from_lookup(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from overrides, then `lookup`, then defaults
    pub fn from_lookup<F>(overrides: &Overrides, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_path = match overrides.store.clone().or_else(|| lookup("QNA_STORE")) {
            Some(raw) => PathBuf::from(shellexpand::tilde(&raw).into_owned()),
            None => default_store_path()?,
        };

        let provider = match overrides.provider.clone().or_else(|| lookup("QNA_EMBED_PROVIDER")) {
            Some(raw) => raw.parse()?,
            None => ProviderChoice::Command,
        };

        let command_line = lookup("QNA_EMBED_COMMAND").unwrap_or_else(|| DEFAULT_EMBED_COMMAND.into());
        let embed_command: Vec<String> = command_line.split_whitespace().map(String::from).collect();
        if embed_command.is_empty() {
            return Err(QnaError::Config("QNA_EMBED_COMMAND is empty".into()));
        }

        let dimension = match lookup("QNA_EMBED_DIM") {
            Some(raw) => Some(parse_positive("QNA_EMBED_DIM", &raw)?),
            None => None,
        };

        let timeout_secs = match lookup("QNA_EMBED_TIMEOUT_SECS") {
            Some(raw) => parse_positive("QNA_EMBED_TIMEOUT_SECS", &raw)? as u64,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Config {
            store_path,
            provider,
            embed_command,
            dimension,
            timeout: Duration::from_secs(timeout_secs),
            ollama_endpoint: lookup("QNA_OLLAMA_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_OLLAMA_ENDPOINT.into()),
            ollama_model: lookup("QNA_OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.into()),
            openai_api_key: lookup("OPENAI_API_KEY"),
        })
    }
}

fn default_store_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| QnaError::Config("Could not determine home directory".into()))?;
    Ok(home.join(".qna").join("records.jsonl"))
}

fn parse_positive(key: &str, raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(QnaError::Config(format!(
            "{} must be a positive integer, got '{}'",
            key, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(overrides: &Overrides, vars: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(overrides, |key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load_with(&Overrides::default(), &[]).unwrap();
        assert_eq!(config.provider, ProviderChoice::Command);
        assert_eq!(config.embed_command, vec!["python", "embedding.py"]);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(config.dimension.is_none());
        assert!(config.store_path.ends_with(".qna/records.jsonl"));
    }

    #[test]
    fn test_overrides_beat_environment() {
        let overrides = Overrides {
            store: Some("/tmp/cli.jsonl".into()),
            provider: Some("hash".into()),
        };
        let config = load_with(
            &overrides,
            &[("QNA_STORE", "/tmp/env.jsonl"), ("QNA_EMBED_PROVIDER", "ollama")],
        )
        .unwrap();
        assert_eq!(config.store_path, PathBuf::from("/tmp/cli.jsonl"));
        assert_eq!(config.provider, ProviderChoice::Hash);
    }

    #[test]
    fn test_environment_values() {
        let config = load_with(
            &Overrides::default(),
            &[
                ("QNA_EMBED_PROVIDER", "OpenAI"),
                ("QNA_EMBED_COMMAND", "python3 scripts/embed.py --quiet"),
                ("QNA_EMBED_DIM", "768"),
                ("QNA_EMBED_TIMEOUT_SECS", "5"),
                ("OPENAI_API_KEY", "sk-test"),
            ],
        )
        .unwrap();
        assert_eq!(config.provider, ProviderChoice::OpenAI);
        assert_eq!(config.embed_command.len(), 3);
        assert_eq!(config.dimension, Some(768));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for vars in [
            vec![("QNA_EMBED_PROVIDER", "word2vec")],
            vec![("QNA_EMBED_DIM", "0")],
            vec![("QNA_EMBED_DIM", "many")],
            vec![("QNA_EMBED_TIMEOUT_SECS", "-1")],
            vec![("QNA_EMBED_COMMAND", "   ")],
        ] {
            let result = load_with(&Overrides::default(), &vars);
            assert!(matches!(result, Err(QnaError::Config(_))), "{:?}", vars);
        }
    }
}
