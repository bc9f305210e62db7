use crate::core::asset::{CharacterReferenceSet, GeneratedImage};
use crate::core::config::{GenerationMode, PipelineConfig};
use crate::core::error::{AssembleError, ExportError, PipelineError, StageFailure};
use crate::core::plan::{Page, Plan};
use crate::services::artist::Artist;
use crate::services::client::GenerativeClient;
use crate::services::designer::CharacterDesigner;
use crate::services::observer::{PipelineEvent, PipelineObserver, RunStage};
use crate::services::planner::Planner;
use crate::utils::assembler;
use crate::utils::pdf::{self, PdfDocument};
use futures_util::StreamExt;
use std::sync::Arc;

/// Everything a completed run produced, including the parts that failed.
#[derive(Debug)]
pub struct RunResult {
    pub plan: Plan,
    pub character_refs: CharacterReferenceSet,
    /// Page numbers present in the document, in plan order.
    pub pages_produced: Vec<u32>,
    pub failures: Vec<StageFailure>,
    pub document: Option<PdfDocument>,
    pub stage: RunStage,
}

impl RunResult {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_characters(&self) -> Vec<&str> {
        self.failures
            .iter()
            .filter_map(|f| match f {
                StageFailure::CharacterDesign { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn failed_panels(&self) -> Vec<(u32, i64)> {
        self.failures
            .iter()
            .filter_map(|f| match f {
                StageFailure::PanelRender {
                    page_number,
                    panel_id,
                    ..
                } => Some((*page_number, *panel_id)),
                _ => None,
            })
            .collect()
    }

    /// Planned pages missing from the document.
    pub fn missing_pages(&self) -> Vec<u32> {
        self.plan
            .pages
            .iter()
            .map(|p| p.page_number)
            .filter(|n| !self.pages_produced.contains(n))
            .collect()
    }
}

/// Drives one prompt through planning, character design, art and export.
pub struct MangaPipeline {
    client: Arc<dyn GenerativeClient>,
    config: PipelineConfig,
    concurrency: usize,
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl MangaPipeline {
    pub fn new(client: Arc<dyn GenerativeClient>, config: PipelineConfig) -> Self {
        Self {
            client,
            config,
            concurrency: 1,
            observers: Vec::new(),
        }
    }

    /// Upper bound on in-flight image requests within a stage.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    async fn emit(&self, event: PipelineEvent<'_>) {
        for observer in &self.observers {
            observer.on_event(&event).await;
        }
    }

    async fn enter(&self, stage: RunStage) {
        self.emit(PipelineEvent::StageEntered(stage)).await;
    }

    async fn record(&self, failures: &mut Vec<StageFailure>, failure: StageFailure) {
        self.emit(PipelineEvent::Failure(&failure)).await;
        failures.push(failure);
    }

    /// Only a planning failure aborts. Every later failure is recorded in
    /// the result and the run continues with what remains.
    pub async fn run(&self, story_prompt: &str) -> Result<RunResult, PipelineError> {
        let client = self.client.as_ref();
        self.enter(RunStage::Start).await;
        log::info!("Pipeline configuration: {}", self.config);

        let plan = match Planner::new(client).plan(story_prompt).await {
            Ok(plan) => plan,
            Err(e) => {
                log::error!("Planning failed: {}", e);
                self.enter(RunStage::Aborted).await;
                return Err(PipelineError::Planning(e));
            }
        };
        self.enter(RunStage::Planned).await;
        self.emit(PipelineEvent::PlanReady(&plan)).await;

        let mut failures = Vec::new();
        let design = CharacterDesigner::new(client, self.config, self.concurrency)
            .design(&plan.characters)
            .await;
        for reference in design.references.iter() {
            self.emit(PipelineEvent::CharacterDesigned {
                name: &reference.name,
                image: &reference.image,
            })
            .await;
        }
        for failure in design.failures {
            self.record(&mut failures, failure).await;
        }
        let character_refs = design.references;
        self.enter(RunStage::CharactersDesigned).await;

        let artist = Artist::new(client, self.config, &character_refs);
        let pages = match self.config.generation {
            GenerationMode::Panel => {
                self.generate_from_panels(&plan, &artist, &mut failures)
                    .await
            }
            GenerationMode::Page => self.generate_pages(&plan, &artist, &mut failures).await,
        };
        self.enter(RunStage::PagesGenerated).await;

        let pages_produced: Vec<u32> = pages
            .iter()
            .map(|p| p.source.page_number())
            .collect();

        let exported = tokio::task::spawn_blocking(move || pdf::export(pages))
            .await
            .map_err(ExportError::from)
            .and_then(|r| r);
        let document = match exported {
            Ok(doc) => {
                log::info!("PDF assembled: {} pages", doc.page_count);
                self.emit(PipelineEvent::DocumentExported(&doc)).await;
                Some(doc)
            }
            Err(e) => {
                self.record(&mut failures, StageFailure::Export(e)).await;
                None
            }
        };
        self.enter(RunStage::Exported).await;
        self.enter(RunStage::Done).await;

        Ok(RunResult {
            plan,
            character_refs,
            pages_produced,
            failures,
            document,
            stage: RunStage::Done,
        })
    }

    /// Pages are processed one after another; panels within a page run
    /// concurrently and are assembled in plan order.
    async fn generate_from_panels(
        &self,
        plan: &Plan,
        artist: &Artist<'_>,
        failures: &mut Vec<StageFailure>,
    ) -> Vec<GeneratedImage> {
        let mut pages = Vec::with_capacity(plan.pages.len());

        for page in &plan.pages {
            self.emit(PipelineEvent::PageStarted {
                page_number: page.page_number,
                panel_count: page.panels.len(),
            })
            .await;

            if page.panels.len() > assembler::MAX_PANELS {
                let failure = StageFailure::PageAssembly {
                    page_number: page.page_number,
                    error: AssembleError::TooManyPanels {
                        count: page.panels.len(),
                        max: assembler::MAX_PANELS,
                    },
                };
                self.record(failures, failure).await;
                continue;
            }

            let results: Vec<_> = futures_util::stream::iter(page.panels.iter())
                .map(|panel| artist.render_panel(page.page_number, panel))
                .buffered(self.concurrency)
                .collect()
                .await;

            let mut panels = Vec::with_capacity(results.len());
            for (panel, result) in page.panels.iter().zip(results) {
                match result {
                    Ok(image) => {
                        self.emit(PipelineEvent::PanelRendered(&image)).await;
                        panels.push(image);
                    }
                    Err(error) => {
                        let failure = StageFailure::PanelRender {
                            page_number: page.page_number,
                            panel_id: panel.id,
                            error,
                        };
                        self.record(failures, failure).await;
                    }
                }
            }

            if !page.panels.is_empty() && panels.is_empty() {
                let failure = StageFailure::PageEmpty {
                    page_number: page.page_number,
                };
                self.record(failures, failure).await;
                continue;
            }

            log::info!(
                "Assembling {} panels into page {}",
                panels.len(),
                page.page_number
            );
            let page_number = page.page_number;
            let assembled = tokio::task::spawn_blocking(move || assembler::assemble(page_number, panels))
                .await
                .map_err(AssembleError::from)
                .and_then(|r| r);
            match assembled {
                Ok(image) => {
                    self.emit(PipelineEvent::PageCompleted(&image)).await;
                    pages.push(image);
                }
                Err(error) => {
                    self.record(failures, StageFailure::PageAssembly { page_number, error })
                        .await;
                }
            }
        }

        pages
    }

    async fn generate_pages(
        &self,
        plan: &Plan,
        artist: &Artist<'_>,
        failures: &mut Vec<StageFailure>,
    ) -> Vec<GeneratedImage> {
        let results: Vec<(&Page, _)> = futures_util::stream::iter(plan.pages.iter())
            .map(|page| async move {
                self.emit(PipelineEvent::PageStarted {
                    page_number: page.page_number,
                    panel_count: page.panels.len(),
                })
                .await;
                (page, artist.render_page(page).await)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut pages = Vec::with_capacity(results.len());
        for (page, result) in results {
            match result {
                Ok(image) => {
                    self.emit(PipelineEvent::PageCompleted(&image)).await;
                    pages.push(image);
                }
                Err(error) => {
                    let failure = StageFailure::PageRender {
                        page_number: page.page_number,
                        error,
                    };
                    self.record(failures, failure).await;
                }
            }
        }
        pages
    }
}
