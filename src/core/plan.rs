//! Storyboard contract produced by the planner and consumed by every
//! later stage.

use crate::core::error::PlanError;
use crate::utils::text::strip_code_blocks;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Character {
    pub name: String,
    pub visual_desc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Panel {
    pub id: i64,
    pub description: String,
    pub visual_prompt: String,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub dialogue: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Page {
    pub page_number: u32,
    pub layout_desc: String,
    pub panels: Vec<Panel>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    pub characters: Vec<Character>,
    pub pages: Vec<Page>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

impl Plan {
    /// Parses a model response into a checked plan. Markdown fences
    /// around the JSON are tolerated.
    pub fn from_json(raw: &str) -> Result<Self, PlanError> {
        let clean = strip_code_blocks(raw);
        let plan: Plan = serde_json::from_str(&clean)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        let mut names = HashSet::new();
        for (index, character) in self.characters.iter().enumerate() {
            if character.name.trim().is_empty() {
                return Err(PlanError::EmptyCharacterName { index });
            }
            if !names.insert(character.name.as_str()) {
                return Err(PlanError::DuplicateCharacter(character.name.clone()));
            }
        }

        let mut page_numbers = HashSet::new();
        for (index, page) in self.pages.iter().enumerate() {
            if page.page_number == 0 {
                return Err(PlanError::InvalidPageNumber { index });
            }
            if !page_numbers.insert(page.page_number) {
                return Err(PlanError::DuplicatePage(page.page_number));
            }

            let mut panel_ids = HashSet::new();
            for panel in &page.panels {
                if !panel_ids.insert(panel.id) {
                    return Err(PlanError::DuplicatePanel {
                        page_number: page.page_number,
                        panel_id: panel.id,
                    });
                }
                if panel.visual_prompt.trim().is_empty() {
                    return Err(PlanError::EmptyVisualPrompt {
                        page_number: page.page_number,
                        panel_id: panel.id,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn panel_count(&self) -> usize {
        self.pages.iter().map(|p| p.panels.len()).sum()
    }
}

/// JSON schema sent with the planning request. The provider enforces it;
/// locally only `Plan::from_json` is applied.
pub fn plan_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "characters": {
                "type": "array",
                "description": "List of characters in the manga",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "description": "Character name"
                        },
                        "visual_desc": {
                            "type": "string",
                            "description": "Detailed visual description including appearance, clothing, distinctive features"
                        }
                    },
                    "required": ["name", "visual_desc"],
                    "additionalProperties": false
                }
            },
            "pages": {
                "type": "array",
                "description": "List of manga pages",
                "items": {
                    "type": "object",
                    "properties": {
                        "page_number": {
                            "type": "integer",
                            "description": "Page number"
                        },
                        "layout_desc": {
                            "type": "string",
                            "description": "Description of the overall page layout and flow"
                        },
                        "panels": {
                            "type": "array",
                            "description": "List of panels on this page",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "id": {
                                        "type": "integer",
                                        "description": "Panel ID"
                                    },
                                    "description": {
                                        "type": "string",
                                        "description": "What happens in this panel"
                                    },
                                    "visual_prompt": {
                                        "type": "string",
                                        "description": "Detailed visual description for image generation"
                                    },
                                    "dialogue": {
                                        "type": "string",
                                        "description": "Character dialogue or narration"
                                    }
                                },
                                "required": ["id", "description", "visual_prompt", "dialogue"],
                                "additionalProperties": false
                            }
                        }
                    },
                    "required": ["page_number", "layout_desc", "panels"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["characters", "pages"],
        "additionalProperties": false
    })
}
