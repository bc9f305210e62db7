use thiserror::Error;

/// A plan payload that does not satisfy the storyboard contract.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Plan JSON does not match the schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Character #{index} has an empty name")]
    EmptyCharacterName { index: usize },

    #[error("Character name '{0}' appears more than once")]
    DuplicateCharacter(String),

    #[error("Page number must be positive (page at position {index})")]
    InvalidPageNumber { index: usize },

    #[error("Page number {0} appears more than once")]
    DuplicatePage(u32),

    #[error("Panel {panel_id} appears more than once on page {page_number}")]
    DuplicatePanel { page_number: u32, panel_id: i64 },

    #[error("Panel {panel_id} on page {page_number} has an empty visual_prompt")]
    EmptyVisualPrompt { page_number: u32, panel_id: i64 },
}

/// Failures raised at the remote model boundary.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Unexpected {provider} response: {detail}")]
    MalformedResponse {
        provider: &'static str,
        detail: String,
    },

    #[error("Response contained no image")]
    NoImage,

    #[error("Image payload could not be decoded: {0}")]
    ImagePayload(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),
}

/// Art generation failure for a single panel or page.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Generated image is not a decodable raster: {0}")]
    Decode(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("{count} panels do not fit on one page (at most {max})")]
    TooManyPanels { count: usize, max: usize },

    #[error("Assembly task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No pages to export")]
    NoPages,

    #[error("Failed to encode page image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to build PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Failed to write PDF: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The only failure that aborts a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Planning failed: {0}")]
    Planning(#[source] ClientError),
}

/// A recoverable failure recorded in the run result.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error("Character sheet for '{name}' failed: {error}")]
    CharacterDesign { name: String, error: ClientError },

    #[error("Panel {panel_id} on page {page_number} failed: {error}")]
    PanelRender {
        page_number: u32,
        panel_id: i64,
        error: RenderError,
    },

    #[error("Page {page_number} failed: {error}")]
    PageRender { page_number: u32, error: RenderError },

    #[error("Page {page_number} has no successfully rendered panels")]
    PageEmpty { page_number: u32 },

    #[error("Page {page_number} could not be assembled: {error}")]
    PageAssembly {
        page_number: u32,
        error: AssembleError,
    },

    #[error("Export failed: {0}")]
    Export(ExportError),
}

impl StageFailure {
    /// Page the failure belongs to, if any.
    pub fn page_number(&self) -> Option<u32> {
        match self {
            StageFailure::PanelRender { page_number, .. }
            | StageFailure::PageRender { page_number, .. }
            | StageFailure::PageEmpty { page_number }
            | StageFailure::PageAssembly { page_number, .. } => Some(*page_number),
            StageFailure::CharacterDesign { .. } | StageFailure::Export(_) => None,
        }
    }
}
