//! Structured progress events emitted by the pipeline.

use crate::core::asset::{GeneratedImage, ImageAsset, ImageSource};
use crate::core::error::StageFailure;
use crate::core::plan::Plan;
use crate::utils::pdf::PdfDocument;
use async_trait::async_trait;
use std::fmt;

/// Run states, in order. `Aborted` is only reachable from `Start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Start,
    Planned,
    CharactersDesigned,
    PagesGenerated,
    Exported,
    Done,
    Aborted,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Start => "start",
            RunStage::Planned => "planned",
            RunStage::CharactersDesigned => "characters designed",
            RunStage::PagesGenerated => "pages generated",
            RunStage::Exported => "exported",
            RunStage::Done => "done",
            RunStage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

pub enum PipelineEvent<'a> {
    StageEntered(RunStage),
    PlanReady(&'a Plan),
    CharacterDesigned { name: &'a str, image: &'a ImageAsset },
    PageStarted { page_number: u32, panel_count: usize },
    PanelRendered(&'a GeneratedImage),
    PageCompleted(&'a GeneratedImage),
    Failure(&'a StageFailure),
    DocumentExported(&'a PdfDocument),
}

#[async_trait]
pub trait PipelineObserver: Send + Sync {
    async fn on_event(&self, event: &PipelineEvent<'_>);
}

/// Reports progress through the `log` facade.
#[derive(Debug, Default)]
pub struct LogObserver;

#[async_trait]
impl PipelineObserver for LogObserver {
    async fn on_event(&self, event: &PipelineEvent<'_>) {
        match event {
            PipelineEvent::StageEntered(stage) => log::debug!("Run stage: {}", stage),
            PipelineEvent::PlanReady(plan) => log::info!(
                "Plan ready: {} characters, {} pages",
                plan.characters.len(),
                plan.pages.len()
            ),
            PipelineEvent::CharacterDesigned { name, .. } => {
                log::info!("Character sheet ready: {}", name)
            }
            PipelineEvent::PageStarted {
                page_number,
                panel_count,
            } => log::info!("Page {} ({} panels)", page_number, panel_count),
            PipelineEvent::PanelRendered(image) => {
                if let ImageSource::Panel {
                    page_number,
                    panel_id,
                } = image.source
                {
                    log::info!("Panel {} of page {} rendered", panel_id, page_number);
                }
            }
            PipelineEvent::PageCompleted(image) => log::info!(
                "Page image ready: {:?} ({}x{})",
                image.source,
                image.width(),
                image.height()
            ),
            PipelineEvent::Failure(failure) => log::warn!("{}", failure),
            PipelineEvent::DocumentExported(doc) => {
                log::info!("Document exported: {} pages", doc.page_count)
            }
        }
    }
}
