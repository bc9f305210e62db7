use crate::core::asset::{CharacterReferenceSet, GeneratedImage, ImageAsset, ImageSource};
use crate::core::config::{CharacterRefMode, ColorMode, PipelineConfig};
use crate::core::error::RenderError;
use crate::core::plan::{Page, Panel};
use crate::services::client::GenerativeClient;

const COLOR_PANEL_SUFFIX: &str =
    ", manga style, vibrant colors, anime art style, professional manga artwork, colorful illustration";
const MONOCHROME_PANEL_SUFFIX: &str = ", manga style, monochrome, black and white, screentones, \
     ink lines, high contrast, anime art style, professional manga artwork";

pub fn panel_style_suffix(color: ColorMode) -> &'static str {
    match color {
        ColorMode::Color => COLOR_PANEL_SUFFIX,
        ColorMode::Monochrome => MONOCHROME_PANEL_SUFFIX,
    }
}

pub fn panel_prompt(panel: &Panel, color: ColorMode) -> String {
    format!("{}{}", panel.visual_prompt, panel_style_suffix(color))
}

/// One directive for a whole page: layout, then every panel in order
/// numbered from 1, then the style clause.
pub fn page_prompt(page: &Page, color: ColorMode) -> String {
    let panel_descriptions = page
        .panels
        .iter()
        .enumerate()
        .map(|(i, panel)| {
            let mut desc = format!("Panel {}: {}", i + 1, panel.visual_prompt);
            if let Some(dialogue) = &panel.dialogue {
                desc.push_str(&format!(" (Dialogue: {})", dialogue));
            }
            desc
        })
        .collect::<Vec<_>>()
        .join(" ");

    match color {
        ColorMode::Color => format!(
            "Full manga page, vibrant colors, high quality professional manga. \
             Page layout: {}. {}. \
             Manga style, colorful illustration, anime art style, panel borders clearly visible",
            page.layout_desc, panel_descriptions
        ),
        ColorMode::Monochrome => format!(
            "Full manga page, black and white, high quality professional manga. \
             Page layout: {}. {}. \
             Manga style, monochrome, screentones, ink lines, high contrast, anime art style, \
             panel borders clearly visible",
            page.layout_desc, panel_descriptions
        ),
    }
}

pub struct Artist<'a> {
    client: &'a dyn GenerativeClient,
    config: PipelineConfig,
    references: Vec<ImageAsset>,
}

impl<'a> Artist<'a> {
    /// With image references enabled, every render call carries the full
    /// reference set, not only the characters in the panel.
    pub fn new(client: &'a dyn GenerativeClient, config: PipelineConfig, refs: &CharacterReferenceSet) -> Self {
        let references = match config.character_refs {
            CharacterRefMode::Image if !refs.is_empty() => refs.images(),
            _ => Vec::new(),
        };
        Self {
            client,
            config,
            references,
        }
    }

    pub async fn render_panel(&self, page_number: u32, panel: &Panel) -> Result<GeneratedImage, RenderError> {
        let prompt = panel_prompt(panel, self.config.color);
        let source = ImageSource::Panel {
            page_number,
            panel_id: panel.id,
        };
        self.render(&prompt, source).await
    }

    pub async fn render_page(&self, page: &Page) -> Result<GeneratedImage, RenderError> {
        let prompt = page_prompt(page, self.config.color);
        let source = ImageSource::Page {
            page_number: page.page_number,
        };
        self.render(&prompt, source).await
    }

    async fn render(&self, prompt: &str, source: ImageSource) -> Result<GeneratedImage, RenderError> {
        log::debug!("Image prompt for {:?}: {}", source, prompt);
        let asset = self.client.request_image(prompt, &self.references).await?;
        let image = asset.decode()?;
        Ok(GeneratedImage::new(source, image))
    }
}
