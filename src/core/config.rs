use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    /// Maximum image requests in flight within one stage.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_folder: default_output(),
            concurrency: default_concurrency(),
            pipeline: PipelineConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Generate each panel, then assemble pages on a grid
    #[default]
    Panel,
    /// Generate every page in a single request
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CharacterRefMode {
    /// Character consistency from text descriptions only
    #[default]
    Text,
    /// Generate character sheets and send them as visual references
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Monochrome,
    Color,
}

/// The three strategy switches of a run. Any combination is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub generation: GenerationMode,
    #[serde(default)]
    pub character_refs: CharacterRefMode,
    #[serde(default)]
    pub color: ColorMode,
}

impl PipelineConfig {
    pub fn new(generation: GenerationMode, character_refs: CharacterRefMode, color: ColorMode) -> Self {
        Self {
            generation,
            character_refs,
            color,
        }
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let generation = match self.generation {
            GenerationMode::Panel => "PER_PANEL",
            GenerationMode::Page => "PER_PAGE",
        };
        let refs = match self.character_refs {
            CharacterRefMode::Text => "TEXT_ONLY",
            CharacterRefMode::Image => "IMAGE_INPUT",
        };
        let color = match self.color {
            ColorMode::Monochrome => "MONOCHROME",
            ColorMode::Color => "COLOR",
        };
        write!(
            f,
            "GenerationMode: {}, CharRefMode: {}, ColorMode: {}",
            generation, refs, color
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_provider")]
    pub name: String, // "openrouter" or "gemini"
    pub openrouter: Option<OpenRouterConfig>,
    pub gemini: Option<GeminiConfig>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider(),
            openrouter: None,
            gemini: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenRouterConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,
    #[serde(default = "default_openrouter_text_model")]
    pub text_model: String,
    #[serde(default = "default_openrouter_image_model")]
    pub image_model: String,
    /// Sent as `HTTP-Referer`. An explicit `null` turns the header off.
    #[serde(default = "default_referer")]
    pub referer: Option<String>,
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openrouter_base_url(),
            text_model: default_openrouter_text_model(),
            image_model: default_openrouter_image_model(),
            referer: default_referer(),
            title: default_title(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_gemini_text_model")]
    pub text_model: String,
    #[serde(default = "default_gemini_image_model")]
    pub image_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_base_url(),
            text_model: default_gemini_text_model(),
            image_model: default_gemini_image_model(),
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_concurrency() -> usize {
    1
}
fn default_provider() -> String {
    "openrouter".to_string()
}
fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_openrouter_text_model() -> String {
    "google/gemini-2.5-flash-preview-09-2025".to_string()
}
fn default_openrouter_image_model() -> String {
    "google/gemini-2.5-flash-image".to_string()
}
fn default_referer() -> Option<String> {
    Some("https://github.com/heavendoor".to_string())
}
fn default_title() -> String {
    "Manga Generator".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_gemini_text_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_gemini_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

/// Looks up a credential: the configured value wins, otherwise the named
/// environment variable.
pub fn resolve_api_key(configured: Option<&str>, env_var: &str) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.trim().is_empty()))
}

impl Config {
    /// Reads the YAML config at `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("{} not found, using default configuration", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml_ng::from_str(content)?;
        Ok(config)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)
            .with_context(|| format!("Failed to create {}", self.output_folder))?;
        Ok(())
    }

    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}
