use crate::core::error::ClientError;
use crate::core::plan::{plan_schema, Plan};
use crate::services::client::{GenerativeClient, PlanRequest};

pub const PLAN_SCHEMA_NAME: &str = "manga_plan";

pub const SYSTEM_PROMPT: &str = r#"
You are a professional Manga Editor.
1. Analyze the user's story request.
2. Create detailed character profiles with visual descriptions.
3. Create a storyboard with pages and panels.
4. OUTPUT MUST BE VALID JSON with this structure:
{
  "characters": [
    {
      "name": "Character Name",
      "visual_desc": "Detailed visual description including appearance, clothing, distinctive features, hair, eyes, etc."
    }
  ],
  "pages": [
    {
      "page_number": 1,
      "layout_desc": "Description of the overall page layout and flow",
      "panels": [
        {
          "id": 1,
          "description": "What happens in this panel",
          "visual_prompt": "Detailed visual description for image generation - scene, composition, character actions, background, mood",
          "dialogue": "Character dialogue or narration"
        }
      ]
    }
  ]
}

IMPORTANT NOTES:
- Create 3-6 pages for a short story
- Each page should have 3-6 panels
- Visual prompts should be very detailed and suitable for image generation
- Include character names in visual_prompt when they appear
- Describe the scene composition, camera angle, and mood
"#;

/// Builds the planning request for a story prompt.
pub fn plan_request(story_prompt: &str) -> PlanRequest {
    PlanRequest {
        system: SYSTEM_PROMPT.to_string(),
        user: format!("Create a manga storyboard for this story:\n\n{}", story_prompt),
        schema_name: PLAN_SCHEMA_NAME.to_string(),
        schema: plan_schema(),
    }
}

pub struct Planner<'a> {
    client: &'a dyn GenerativeClient,
}

impl<'a> Planner<'a> {
    pub fn new(client: &'a dyn GenerativeClient) -> Self {
        Self { client }
    }

    /// Turns a story prompt into a checked plan. Page and panel counts are
    /// requested from the model, not enforced here.
    pub async fn plan(&self, story_prompt: &str) -> Result<Plan, ClientError> {
        let plan = self.client.request_plan(&plan_request(story_prompt)).await?;
        log::info!(
            "Plan generated: {} characters, {} pages, {} panels",
            plan.characters.len(),
            plan.pages.len(),
            plan.panel_count()
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::ScriptedClient;

    #[test]
    fn test_plan_request_shape() {
        let request = plan_request("A robot learns to paint");
        assert_eq!(request.schema_name, "manga_plan");
        assert!(request.system.contains("professional Manga Editor"));
        assert!(request.system.contains("3-6 pages"));
        assert_eq!(
            request.user,
            "Create a manga storyboard for this story:\n\nA robot learns to paint"
        );
        assert_eq!(request.schema, plan_schema());
    }

    #[tokio::test]
    async fn test_plan_delegates_to_client() {
        let client = ScriptedClient::new(Some(ScriptedClient::sample_plan(&[2, 3])));
        let plan = Planner::new(&client).plan("A robot learns to paint").await.unwrap();
        assert_eq!(plan.pages.len(), 2);

        let requests = client.plan_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].ends_with("A robot learns to paint"));
    }

    #[tokio::test]
    async fn test_plan_failure_is_returned() {
        let client = ScriptedClient::new(None);
        let result = Planner::new(&client).plan("anything").await;
        assert!(result.is_err());
        assert!(client.image_prompts().is_empty());
    }
}
