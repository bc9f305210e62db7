use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use prompt2manga::core::config::{
    CharacterRefMode, ColorMode, Config, GenerationMode, PipelineConfig, DEFAULT_CONFIG_PATH,
};
use prompt2manga::core::error::{AssembleError, StageFailure};
use prompt2manga::core::io::Storage;
use prompt2manga::services::observer::{PipelineEvent, PipelineObserver, RunStage};
use prompt2manga::services::workflow::RunResult;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "prompt2manga", version, about = "Turn a story prompt into a manga PDF")]
pub struct Args {
    /// Story prompt. Asked for interactively when neither this nor
    /// --prompt-file is given.
    pub prompt: Option<String>,

    /// Read the story prompt from a file
    #[arg(long, conflicts_with = "prompt")]
    pub prompt_file: Option<PathBuf>,

    /// Render panels and assemble them, or render whole pages
    #[arg(long, value_enum)]
    pub mode: Option<GenerationMode>,

    /// Describe characters in text only, or design reference sheets
    #[arg(long, value_enum)]
    pub char_ref: Option<CharacterRefMode>,

    /// Full color instead of black and white
    #[arg(long)]
    pub color: bool,

    /// PDF path [default: <output_folder>/manga.pdf]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Maximum image requests in flight
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl Args {
    /// Command line flags override the config file.
    pub fn apply(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.pipeline.generation = mode;
        }
        if let Some(char_ref) = self.char_ref {
            config.pipeline.character_refs = char_ref;
        }
        if self.color {
            config.pipeline.color = ColorMode::Color;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
    }

    pub fn pdf_path(&self, config: &Config) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| Path::new(&config.output_folder).join("manga.pdf"))
    }
}

pub async fn read_prompt(args: &Args, storage: &dyn Storage) -> Result<String> {
    let prompt = if let Some(prompt) = &args.prompt {
        prompt.clone()
    } else if let Some(path) = &args.prompt_file {
        let path_str = path.to_string_lossy();
        if !storage.exists(&path_str).await? {
            bail!("Prompt file not found: {}", path.display());
        }
        let bytes = storage
            .read(&path_str)
            .await
            .with_context(|| format!("Failed to read prompt file {}", path.display()))?;
        String::from_utf8(bytes).context("Prompt file is not valid UTF-8")?
    } else {
        inquire::Text::new("Story prompt:")
            .with_help_message("Describe the story to turn into a manga")
            .prompt()?
    };

    let prompt = prompt.trim().to_string();
    if prompt.is_empty() {
        bail!("Prompt is empty");
    }
    Ok(prompt)
}

/// Progress bar over render units: character sheets plus panels, or
/// whole pages.
pub struct ProgressObserver {
    pb: ProgressBar,
    config: PipelineConfig,
}

impl ProgressObserver {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
                .progress_chars("#>-"),
        );
        Ok(Self { pb, config })
    }
}

#[async_trait]
impl PipelineObserver for ProgressObserver {
    async fn on_event(&self, event: &PipelineEvent<'_>) {
        match event {
            PipelineEvent::PlanReady(plan) => {
                let sheets = match self.config.character_refs {
                    CharacterRefMode::Image => plan.characters.len(),
                    CharacterRefMode::Text => 0,
                };
                let art = match self.config.generation {
                    GenerationMode::Panel => plan.panel_count(),
                    GenerationMode::Page => plan.pages.len(),
                };
                self.pb.set_length((sheets + art) as u64);
            }
            PipelineEvent::PageStarted { page_number, .. } => {
                self.pb.set_message(format!("page {}", page_number));
            }
            PipelineEvent::CharacterDesigned { .. } | PipelineEvent::PanelRendered(_) => {
                self.pb.inc(1)
            }
            PipelineEvent::PageCompleted(_) if self.config.generation == GenerationMode::Page => {
                self.pb.inc(1)
            }
            PipelineEvent::Failure(
                StageFailure::CharacterDesign { .. }
                | StageFailure::PanelRender { .. }
                | StageFailure::PageRender { .. },
            ) => self.pb.inc(1),
            // Oversized pages are skipped before any panel is rendered
            PipelineEvent::Failure(StageFailure::PageAssembly {
                error: AssembleError::TooManyPanels { count, .. },
                ..
            }) => self.pb.inc(*count as u64),
            PipelineEvent::StageEntered(RunStage::PagesGenerated) => {
                self.pb.finish_with_message("Generation complete");
            }
            _ => {}
        }
    }
}

pub fn print_summary(result: &RunResult, pdf_path: &Path) {
    println!();
    println!("Characters: {}", result.plan.characters.len());
    if !result.character_refs.is_empty() {
        println!(
            "  reference sheets: {}",
            result.character_refs.names().collect::<Vec<_>>().join(", ")
        );
    }
    let failed_characters = result.failed_characters();
    if !failed_characters.is_empty() {
        println!("  failed: {}", failed_characters.join(", "));
    }

    println!(
        "Pages: {}/{} produced",
        result.pages_produced.len(),
        result.plan.pages.len()
    );
    let missing = result.missing_pages();
    if !missing.is_empty() {
        println!("  missing: {:?}", missing);
    }
    let failed_panels = result.failed_panels().len();
    if failed_panels > 0 {
        println!("  panels failed: {}", failed_panels);
    }
    for failure in &result.failures {
        if let Some(page_number) = failure.page_number() {
            println!("  [page {}] {}", page_number, failure);
        }
    }

    match &result.document {
        Some(doc) => println!("Manga saved: {} ({} pages)", pdf_path.display(), doc.page_count),
        None => println!("No PDF was produced"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prompt2manga::core::io::NativeStorage;

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "prompt2manga",
            "A robot learns to paint",
            "--mode",
            "page",
            "--char-ref",
            "image",
            "--color",
            "--concurrency",
            "3",
        ])
        .unwrap();
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(args.prompt.as_deref(), Some("A robot learns to paint"));
        assert_eq!(config.pipeline.generation, GenerationMode::Page);
        assert_eq!(config.pipeline.character_refs, CharacterRefMode::Image);
        assert_eq!(config.pipeline.color, ColorMode::Color);
        assert_eq!(config.concurrency, 3);
        assert_eq!(args.pdf_path(&config), Path::new("output").join("manga.pdf"));
    }

    #[test]
    fn test_defaults_leave_config_untouched() {
        let args = Args::try_parse_from(["prompt2manga", "-o", "out/book.pdf", "story"]).unwrap();
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(args.config, Path::new(DEFAULT_CONFIG_PATH));
        assert_eq!(args.pdf_path(&config), Path::new("out/book.pdf"));
    }

    #[test]
    fn test_prompt_and_prompt_file_conflict() {
        assert!(Args::try_parse_from(["prompt2manga", "story", "--prompt-file", "p.txt"]).is_err());
    }

    #[tokio::test]
    async fn test_prompt_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "  A robot learns to paint\n").unwrap();

        let args = Args::try_parse_from(["prompt2manga", "--prompt-file", path.to_str().unwrap()]).unwrap();
        let prompt = read_prompt(&args, &NativeStorage::new()).await.unwrap();
        assert_eq!(prompt, "A robot learns to paint");
    }

    #[tokio::test]
    async fn test_missing_prompt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nowhere.txt");

        let args = Args::try_parse_from(["prompt2manga", "--prompt-file", path.to_str().unwrap()]).unwrap();
        let err = read_prompt(&args, &NativeStorage::new()).await.unwrap_err();
        assert!(err.to_string().starts_with("Prompt file not found"));
    }

    #[tokio::test]
    async fn test_blank_prompt_is_rejected() {
        let args = Args::try_parse_from(["prompt2manga", "   "]).unwrap();
        assert!(read_prompt(&args, &NativeStorage::new()).await.is_err());
    }
}
