//! User configuration stored as TOML
//!
//! Every field has a default, so a missing file or a file naming only a few
//! keys is valid. The API key is never read from or written to the file.

use anyhow::{Context, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cache::DEFAULT_TTL_DAYS;
use crate::history::DEFAULT_MAX_SINCE_RESET;
use crate::storage::StoragePaths;
use crate::summary::SummaryMarkers;

/// Environment variables checked for the API key, in order
pub const API_KEY_VARS: &[&str] = &["LYSS_API_KEY", "OPENAI_API_KEY"];

/// Keys understood by [`Config::get`] and [`Config::set`], in listing order
pub const KEYS: &[&str] = &[
    "llm.base_url",
    "llm.temperature",
    "llm.max_tokens",
    "llm.timeout_secs",
    "llm.api_key",
    "storage.base_dir",
    "chat.model",
    "chat.max_since_reset",
    "chat.resume_after_summary",
    "quick.model",
    "quick.cache_ttl_days",
];

/// Lyss configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub chat: ChatConfig,
    pub quick: QuickConfig,
}

/// Endpoint and sampling settings shared by both modes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Only ever populated programmatically; see [`API_KEY_VARS`]
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    /// Limit on connecting and on each read of the reply, not on the whole reply
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the platform data directory; `LYSS_HOME` wins over both
    pub base_dir: Option<PathBuf>,
}

/// Settings for the conversational mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
    pub max_since_reset: usize,
    pub resume_after_summary: bool,
    pub instructions: Vec<String>,
    pub markers: SummaryMarkers,
}

/// Settings for the single-turn cached mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickConfig {
    pub model: String,
    pub cache_ttl_days: i64,
    pub instructions: Vec<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: None,
            max_tokens: None,
            timeout_secs: 120,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4-turbo-preview".to_string(),
            max_since_reset: DEFAULT_MAX_SINCE_RESET,
            resume_after_summary: false,
            instructions: vec![
                "Keep messages short and straight to the point. Use simple README formatting, no LaTeX."
                    .to_string(),
                "Make a summary at the end of every message of all the key information from all \
                 the conversation, so include the information from the previous summary, enclose \
                 the full summary with BEGIN_SUMM and END_SUMM. The goal of this summary is to keep \
                 track of the key information of all the messages for the context, it is not \
                 displayed to the user."
                    .to_string(),
            ],
            markers: SummaryMarkers::default(),
        }
    }
}

impl Default for QuickConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            cache_ttl_days: DEFAULT_TTL_DAYS,
            instructions: vec![
                "Make short straight to the point answers while remaining exhaustive and \
                 mentioning important points."
                    .to_string(),
            ],
        }
    }
}

impl LlmConfig {
    /// First non-blank key among [`API_KEY_VARS`]
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;
        Ok(API_KEY_VARS.iter().find_map(|var| {
            env::var(var)
                .ok()
                .filter(|value| !value.trim().is_empty())
        }))
    }

    /// The resolved key with everything but its last four characters hidden
    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        Ok(self.resolved_api_key()?.as_deref().map(redact))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            bail!("API keys must come from the environment, not the configuration file");
        }
        Ok(())
    }
}

fn redact(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "***".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{}", tail)
}

impl StorageConfig {
    /// Base directory for the durable stores
    pub fn resolved_base_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(home) = env::var_os("LYSS_HOME") {
            return Ok(PathBuf::from(home));
        }
        if let Some(dir) = &self.base_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join("lyss"))
            .ok_or_else(|| anyhow!("No platform data directory; set LYSS_HOME"))
    }

    pub fn paths(&self) -> anyhow::Result<StoragePaths> {
        self.resolved_base_dir().map(StoragePaths::new)
    }
}

impl Config {
    /// `LYSS_CONFIG_DIR`, or the platform config directory
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        if let Some(dir) = env::var_os("LYSS_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        dirs::config_dir()
            .map(|dir| dir.join("lyss"))
            .ok_or_else(|| anyhow!("No platform config directory; set LYSS_CONFIG_DIR"))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Read `path`; a missing file means defaults
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot read {}", path.display()));
            }
        };

        let config: Self =
            toml::from_str(&contents).with_context(|| format!("Cannot parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Cannot serialize configuration")?;
        fs::write(path, contents).with_context(|| format!("Cannot write {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;
        if self.quick.cache_ttl_days <= 0 {
            bail!("quick.cache_ttl_days must be at least 1");
        }
        let markers = &self.chat.markers;
        if markers.opening_first.is_empty() || markers.opening_second.is_empty() {
            bail!("chat.markers opening fragments must not be empty");
        }
        Ok(())
    }

    /// Display value of `key`
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        let value = match key {
            "llm.base_url" => self.llm.base_url.clone(),
            "llm.temperature" => or_provider_default(self.llm.temperature),
            "llm.max_tokens" => or_provider_default(self.llm.max_tokens),
            "llm.timeout_secs" => self.llm.timeout_secs.to_string(),
            "llm.api_key" | "api_key" => self
                .llm
                .redacted_api_key()?
                .unwrap_or_else(|| "(not set - use LYSS_API_KEY or OPENAI_API_KEY env var)".to_string()),
            "storage.base_dir" => self.storage.resolved_base_dir()?.display().to_string(),
            "chat.model" => self.chat.model.clone(),
            "chat.max_since_reset" => self.chat.max_since_reset.to_string(),
            "chat.resume_after_summary" => self.chat.resume_after_summary.to_string(),
            "quick.model" => self.quick.model.clone(),
            "quick.cache_ttl_days" => self.quick.cache_ttl_days.to_string(),
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }

    /// Parse `value` into the field named by `key`
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "llm.base_url" => self.llm.base_url = value.trim_end_matches('/').to_string(),
            "llm.temperature" => {
                let temperature: f32 = parse(key, value)?;
                if !(0.0..=2.0).contains(&temperature) {
                    bail!("llm.temperature must be between 0.0 and 2.0");
                }
                self.llm.temperature = Some(temperature);
            }
            "llm.max_tokens" => self.llm.max_tokens = Some(parse(key, value)?),
            "llm.timeout_secs" => self.llm.timeout_secs = parse(key, value)?,
            "llm.api_key" | "api_key" => bail!(
                "API keys are not stored in configuration. \
                 Set the LYSS_API_KEY or OPENAI_API_KEY environment variable instead."
            ),
            "storage.base_dir" => self.storage.base_dir = Some(PathBuf::from(value)),
            "chat.model" => self.chat.model = value.to_string(),
            "chat.max_since_reset" => self.chat.max_since_reset = parse(key, value)?,
            "chat.resume_after_summary" => self.chat.resume_after_summary = parse(key, value)?,
            "quick.model" => self.quick.model = value.to_string(),
            "quick.cache_ttl_days" => {
                let days: i64 = parse(key, value)?;
                if days <= 0 {
                    bail!("quick.cache_ttl_days must be at least 1");
                }
                self.quick.cache_ttl_days = days;
            }
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// Every key in [`KEYS`] with its display value
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Delete the config file so the defaults apply again
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        match fs::remove_file(&path) {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                Err(e).with_context(|| format!("Cannot remove {}", path.display()))
            }
            _ => Ok(()),
        }
    }
}

fn parse<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {}", key, value))
}

fn or_provider_default<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "(provider default)".to_string(), |v| v.to_string())
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow!(
        "Unknown configuration key: {}. Use `lyss config list` to see available keys.",
        key
    )
}
