use crate::core::asset::ImageSource;
use crate::core::io::Storage;
use crate::services::observer::{PipelineEvent, PipelineObserver};
use crate::utils::pdf::encode_jpeg;
use crate::utils::text::file_stem;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Persists intermediate and final artifacts as the run produces them.
/// Write failures are logged and never stop the run.
pub struct ArtifactWriter {
    storage: Arc<dyn Storage>,
    output_folder: PathBuf,
    pdf_path: PathBuf,
}

impl ArtifactWriter {
    pub fn new(storage: Arc<dyn Storage>, output_folder: impl Into<PathBuf>, pdf_path: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            output_folder: output_folder.into(),
            pdf_path: pdf_path.into(),
        }
    }

    pub fn plan_path(&self) -> PathBuf {
        self.output_folder.join("manga_plan.json")
    }

    pub fn character_path(&self, name: &str, extension: &str) -> PathBuf {
        self.output_folder
            .join("character_refs")
            .join(format!("{}.{}", file_stem(name), extension))
    }

    pub fn panel_path(&self, page_number: u32, panel_id: i64) -> PathBuf {
        self.output_folder
            .join(format!("page_{}_panels", page_number))
            .join(format!("panel_{}.jpg", panel_id))
    }

    pub fn page_path(&self, page_number: u32) -> PathBuf {
        self.output_folder.join(format!("page_{}.jpg", page_number))
    }

    async fn save(&self, path: &Path, content: &[u8]) {
        let path_str = path.to_string_lossy();
        match self.storage.write(&path_str, content).await {
            Ok(()) => log::info!("Saved: {}", path_str),
            Err(e) => log::warn!("Failed to save {}: {}", path_str, e),
        }
    }

    async fn save_jpeg(&self, path: &Path, image: &image::DynamicImage) {
        let rgb = image.to_rgb8();
        match tokio::task::spawn_blocking(move || encode_jpeg(&rgb)).await {
            Ok(Ok(bytes)) => self.save(path, &bytes).await,
            Ok(Err(e)) => log::warn!("Failed to encode {}: {}", path.display(), e),
            Err(e) => log::warn!("Encoding task for {} failed: {}", path.display(), e),
        }
    }
}

#[async_trait]
impl PipelineObserver for ArtifactWriter {
    async fn on_event(&self, event: &PipelineEvent<'_>) {
        match event {
            PipelineEvent::PlanReady(plan) => match serde_json::to_vec_pretty(plan) {
                Ok(json) => self.save(&self.plan_path(), &json).await,
                Err(e) => log::warn!("Failed to serialize plan: {}", e),
            },
            PipelineEvent::CharacterDesigned { name, image } => {
                let path = self.character_path(name, image.extension());
                self.save(&path, &image.data).await;
            }
            PipelineEvent::PanelRendered(image) => {
                if let ImageSource::Panel {
                    page_number,
                    panel_id,
                } = image.source
                {
                    self.save_jpeg(&self.panel_path(page_number, panel_id), &image.image)
                        .await;
                }
            }
            PipelineEvent::PageCompleted(image) => {
                if let ImageSource::Page { page_number } = image.source {
                    self.save_jpeg(&self.page_path(page_number), &image.image).await;
                }
            }
            PipelineEvent::DocumentExported(doc) => {
                self.save(&self.pdf_path, &doc.bytes).await;
            }
            PipelineEvent::StageEntered(_)
            | PipelineEvent::PageStarted { .. }
            | PipelineEvent::Failure(_) => {}
        }
    }
}
