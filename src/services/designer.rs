use crate::core::asset::{CharacterReference, CharacterReferenceSet};
use crate::core::config::{CharacterRefMode, PipelineConfig};
use crate::core::error::StageFailure;
use crate::core::plan::Character;
use crate::services::client::GenerativeClient;
use futures_util::StreamExt;

pub fn character_sheet_prompt(character: &Character) -> String {
    format!(
        "Character reference sheet, multiple views, {}, {}, manga style, character design, \
         turnaround, white background, professional anime character sheet, detailed line art",
        character.name, character.visual_desc
    )
}

#[derive(Debug, Default)]
pub struct DesignOutcome {
    pub references: CharacterReferenceSet,
    pub failures: Vec<StageFailure>,
}

pub struct CharacterDesigner<'a> {
    client: &'a dyn GenerativeClient,
    config: PipelineConfig,
    concurrency: usize,
}

impl<'a> CharacterDesigner<'a> {
    pub fn new(client: &'a dyn GenerativeClient, config: PipelineConfig, concurrency: usize) -> Self {
        Self {
            client,
            config,
            concurrency: concurrency.max(1),
        }
    }

    /// Generates one reference sheet per character. A failed sheet only
    /// drops that character from the set.
    pub async fn design(&self, characters: &[Character]) -> DesignOutcome {
        if self.config.character_refs == CharacterRefMode::Text {
            return DesignOutcome::default();
        }

        let client = self.client;
        let mut results: Vec<_> = futures_util::stream::iter(characters.iter().enumerate())
            .map(|(i, character)| async move {
                log::info!("Generating character sheet for: {}", character.name);
                let prompt = character_sheet_prompt(character);
                (i, character, client.request_image(&prompt, &[]).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.sort_by_key(|(i, _, _)| *i);

        let mut references = Vec::new();
        let mut failures = Vec::new();
        for (_, character, result) in results {
            match result {
                Ok(image) => references.push(CharacterReference {
                    name: character.name.clone(),
                    image,
                }),
                Err(error) => {
                    log::warn!("Character sheet for {} failed: {}", character.name, error);
                    failures.push(StageFailure::CharacterDesign {
                        name: character.name.clone(),
                        error,
                    });
                }
            }
        }

        DesignOutcome {
            references: CharacterReferenceSet::new(references),
            failures,
        }
    }
}
