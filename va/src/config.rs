//! vision-agent configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the project-local config file
pub const LOCAL_CONFIG_FILE: &str = ".vision-agent.yml";

/// Main vision-agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Agent / LLM backend configuration
    pub agent: AgentConfig,

    /// Generated-code execution configuration
    pub runner: RunnerConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the API key environment variable is set. Call this before
    /// the session starts so a missing credential never reaches the loop.
    pub fn validate(&self) -> Result<()> {
        debug!(api_key_env = %self.agent.api_key_env, "Config::validate: called");
        if std::env::var(&self.agent.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "API key not found. Please set the {} environment variable.",
                self.agent.api_key_env
            ));
        }
        Ok(())
    }

    /// Resolve the agent section into a config carrying the actual API key
    pub fn resolve_agent(&self) -> Result<ResolvedAgentConfig> {
        debug!(provider = %self.agent.provider, model = %self.agent.model, "Config::resolve_agent: called");
        let api_key = std::env::var(&self.agent.api_key_env)
            .map_err(|_| eyre::eyre!("Environment variable {} is not set", self.agent.api_key_env))?;

        Ok(ResolvedAgentConfig {
            provider: self.agent.provider.clone(),
            model: self.agent.model.clone(),
            api_key,
            base_url: self.agent.base_url.trim_end_matches('/').to_string(),
            max_tokens: self.agent.max_tokens,
            timeout_ms: self.agent.timeout_ms,
            temperature: self.agent.temperature,
        })
    }

    /// Load configuration with fallback chain
    ///
    /// 1. Explicit path (errors are fatal)
    /// 2. `./.vision-agent.yml`
    /// 3. `~/.config/vision-agent/vision-agent.yml`
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(user_config) = user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, ignoring any other problems with the file
    ///
    /// Logging is set up before the full config is loaded, so this must never fail.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => [Some(PathBuf::from(LOCAL_CONFIG_FILE)), user_config_path()]
                .into_iter()
                .flatten()
                .collect(),
        };

        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vision-agent").join("vision-agent.yml"))
}

/// Agent / LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Provider name (currently only "openai" supported)
    pub provider: String,

    /// Model identifier (must accept image input)
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 300_000,
            temperature: 0.0,
        }
    }
}

/// Agent config with the API key read from the environment
#[derive(Clone)]
pub struct ResolvedAgentConfig {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub temperature: f32,
}

impl std::fmt::Debug for ResolvedAgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedAgentConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Generated-code execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Interpreter used to run generated programs
    pub interpreter: String,

    /// Suffix of the temporary program file
    #[serde(rename = "file-suffix")]
    pub file_suffix: String,

    /// Import preamble prepended to every executed program
    pub preamble: String,

    /// Maximum test executions per turn before giving up
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Ask the operator before executing generated code
    #[serde(rename = "confirm-execution")]
    pub confirm_execution: bool,

    /// Append a `__main__` call of the generated function to code without a test
    #[serde(rename = "entry-call")]
    pub entry_call: bool,

    /// Directory for temporary program files (system temp dir when unset)
    #[serde(rename = "temp-dir")]
    pub temp_dir: Option<PathBuf>,

    /// Literal fragments replaced with the real input path
    #[serde(rename = "input-placeholders")]
    pub input_placeholders: Vec<String>,

    /// Literal fragments replaced with the real output path
    #[serde(rename = "output-placeholders")]
    pub output_placeholders: Vec<String>,

    /// Isolation applied to the child process
    pub sandbox: SandboxConfig,
}

/// Tool functions the generated code may call
pub const DEFAULT_PREAMBLE: &str = "from vision_agent.tools import load_image, save_image, \
overlay_bounding_boxes, overlay_segmentation_masks, overlay_heat_map, \
grounding_dino, grounding_sam, owl_v2, florence2_ocr, clip, vit_image_classification, \
vit_nsfw_classification, depth_anything_v2, detr_segmentation, blip_image_caption, \
closest_box_distance, closest_mask_distance, extract_frames\n";

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            file_suffix: ".py".to_string(),
            preamble: DEFAULT_PREAMBLE.to_string(),
            max_attempts: 5,
            confirm_execution: false,
            entry_call: true,
            temp_dir: None,
            input_placeholders: vec![
                "path/to/actual_input_image.jpg".to_string(),
                "path/to/your/image.jpg".to_string(),
            ],
            output_placeholders: vec!["path/to/output_image.jpg".to_string()],
            sandbox: SandboxConfig::default(),
        }
    }
}

/// Isolation policy for generated-code processes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Kill the child after this many milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Run the child in a fresh scratch directory instead of the current one
    #[serde(rename = "isolate-workdir")]
    pub isolate_workdir: bool,

    /// Pass the full parent environment to the child
    #[serde(rename = "inherit-env")]
    pub inherit_env: bool,

    /// Variables passed through when `inherit-env` is false
    #[serde(rename = "env-allow")]
    pub env_allow: Vec<String>,

    /// Address-space limit in MB (Linux only)
    #[serde(rename = "max-memory-mb")]
    pub max_memory_mb: Option<u64>,

    /// CPU-time limit in seconds (Linux only)
    #[serde(rename = "max-cpu-secs")]
    pub max_cpu_secs: Option<u64>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 120_000,
            isolate_workdir: false,
            inherit_env: true,
            env_allow: vec![
                "PATH".to_string(),
                "HOME".to_string(),
                "LANG".to_string(),
                "PYTHONPATH".to_string(),
                "VIRTUAL_ENV".to_string(),
                "OPENAI_API_KEY".to_string(),
            ],
            max_memory_mb: None,
            max_cpu_secs: None,
        }
    }
}
