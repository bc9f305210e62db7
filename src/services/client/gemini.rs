use super::{read_body, GenerativeClient, PlanRequest};
use crate::core::asset::ImageAsset;
use crate::core::config::GeminiConfig;
use crate::core::error::ClientError;
use crate::core::plan::Plan;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PROVIDER: &str = "Gemini";

/// Native Gemini `generateContent` endpoint.
#[derive(Debug)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    text_model: String,
    image_model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: &str, config: &GeminiConfig) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            client: reqwest::Client::new(),
        }
    }

    async fn generate(&self, model: &str, request: &GeminiRequest) -> Result<GeminiResponse, ClientError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .json(request)
            .send()
            .await?;
        let body = read_body(PROVIDER, resp).await?;

        let result: GeminiResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::MalformedResponse {
                provider: PROVIDER,
                detail: format!("Failed to parse response: {}. Body: {}", e, body),
            })?;

        if let Some(err) = result.error {
            return Err(ClientError::MalformedResponse {
                provider: PROVIDER,
                detail: format!("API returned error: {}", err.message),
            });
        }
        Ok(result)
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

fn plan_request_body(request: &PlanRequest) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart::Text {
                text: request.user.clone(),
            }],
        }],
        system_instruction: Some(GeminiSystemInstruction {
            parts: vec![GeminiPart::Text {
                text: request.system.clone(),
            }],
        }),
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_json_schema: Some(request.schema.clone()),
            ..Default::default()
        }),
    }
}

fn image_request_body(prompt: &str, references: &[ImageAsset]) -> GeminiRequest {
    let mut parts = vec![GeminiPart::Text {
        text: prompt.to_string(),
    }];
    parts.extend(references.iter().map(|r| GeminiPart::InlineData {
        inline_data: InlineData {
            mime_type: r.mime_type.clone(),
            data: r.to_base64(),
        },
    }));

    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user".to_string(),
            parts,
        }],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_modalities: Some(vec!["TEXT", "IMAGE"]),
            ..Default::default()
        }),
    }
}

fn first_candidate(resp: &GeminiResponse) -> Result<&GeminiCandidate, ClientError> {
    resp.candidates
        .as_ref()
        .and_then(|c| c.first())
        .ok_or_else(|| ClientError::MalformedResponse {
            provider: PROVIDER,
            detail: "response has no candidates".to_string(),
        })
}

fn extract_text(resp: &GeminiResponse) -> Result<&str, ClientError> {
    let candidate = first_candidate(resp)?;
    candidate
        .content
        .as_ref()
        .and_then(|c| c.parts.iter().find_map(|p| p.text.as_deref()))
        .ok_or_else(|| ClientError::MalformedResponse {
            provider: PROVIDER,
            detail: format!(
                "response empty. Finish reason: {}",
                candidate.finish_reason.as_deref().unwrap_or("UNKNOWN")
            ),
        })
}

fn extract_first_image(resp: &GeminiResponse) -> Result<ImageAsset, ClientError> {
    let inline = first_candidate(resp)?
        .content
        .as_ref()
        .and_then(|c| c.parts.iter().find_map(|p| p.inline_data.as_ref()))
        .ok_or(ClientError::NoImage)?;
    ImageAsset::from_base64(Some(&inline.mime_type), &inline.data)
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn request_plan(&self, request: &PlanRequest) -> Result<Plan, ClientError> {
        let resp = self.generate(&self.text_model, &plan_request_body(request)).await?;
        let text = extract_text(&resp)?;
        Ok(Plan::from_json(text)?)
    }

    async fn request_image(
        &self,
        prompt: &str,
        references: &[ImageAsset],
    ) -> Result<ImageAsset, ClientError> {
        let resp = self
            .generate(&self.image_model, &image_request_body(prompt, references))
            .await?;
        extract_first_image(&resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plan::plan_schema;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_gemini_response_parsing_safety_block() {
        let json = r#"{
            "candidates": [
                {
                    "finishReason": "SAFETY",
                    "index": 0
                }
            ]
        }"#;

        let result: GeminiResponse = serde_json::from_str(json).unwrap();
        let err = extract_text(&result).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
        assert!(matches!(extract_first_image(&result), Err(ClientError::NoImage)));
    }

    #[test]
    fn test_gemini_image_part_after_text() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [
                            { "text": "Here is your panel" },
                            { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
                        ],
                        "role": "model"
                    },
                    "finishReason": "STOP"
                }
            ]
        }"#;

        let result: GeminiResponse = serde_json::from_str(json).unwrap();
        let image = extract_first_image(&result).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, vec![1, 2, 3]);
    }

    #[test]
    fn test_image_body_uses_inline_references() {
        let refs = vec![ImageAsset::new("image/jpeg", vec![1, 2, 3])];
        let body = serde_json::to_value(image_request_body("draw", &refs)).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "draw");
        assert_eq!(
            parts[1]["inlineData"],
            json!({"mimeType": "image/jpeg", "data": "AQID"})
        );
        assert_eq!(
            body["generationConfig"]["responseModalities"],
            json!(["TEXT", "IMAGE"])
        );
        assert!(body.get("system_instruction").is_none());
    }

    #[tokio::test]
    async fn test_request_plan_sends_json_schema() {
        let server = MockServer::start().await;
        let plan_text = r#"{"characters": [], "pages": [{"page_number": 1, "layout_desc": "one", "panels": []}]}"#;

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "g-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": plan_text}]}, "finishReason": "STOP"}]
            })))
            .mount(&server)
            .await;

        let config = GeminiConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        let client = GeminiClient::new("g-test", &config);
        let request = PlanRequest {
            system: "system".to_string(),
            user: "story".to_string(),
            schema_name: "manga_plan".to_string(),
            schema: plan_schema(),
        };

        let plan = client.request_plan(&request).await.unwrap();
        assert_eq!(plan.pages.len(), 1);

        let received = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseJsonSchema"], plan_schema());
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "system");
    }
}
