use super::{read_body, GenerativeClient, PlanRequest};
use crate::core::asset::ImageAsset;
use crate::core::config::OpenRouterConfig;
use crate::core::error::ClientError;
use crate::core::plan::Plan;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PROVIDER: &str = "OpenRouter";

/// OpenAI-compatible chat completions endpoint (OpenRouter by default).
#[derive(Debug)]
pub struct OpenRouterClient {
    api_key: String,
    base_url: String,
    text_model: String,
    image_model: String,
    referer: Option<String>,
    title: String,
    client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(api_key: &str, config: &OpenRouterConfig) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            referer: config.referer.clone(),
            title: config.title.clone(),
            client: reqwest::Client::new(),
        }
    }

    async fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Title", self.title.as_str());
        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer.as_str());
        }

        let resp = builder.json(request).send().await?;
        let body = read_body(PROVIDER, resp).await?;

        let result: ChatResponse =
            serde_json::from_str(&body).map_err(|e| ClientError::MalformedResponse {
                provider: PROVIDER,
                detail: format!("{}. Body: {}", e, body),
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
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modalities: Option<Vec<&'static str>>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Deserialize)]
struct ImageUrl {
    url: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: String,
    strict: bool,
    schema: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    #[serde(default)]
    images: Vec<ResponseImage>,
}

#[derive(Deserialize)]
struct ResponseImage {
    image_url: ImageUrl,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

fn plan_request_body<'a>(model: &'a str, request: &PlanRequest) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: MessageContent::Text(request.system.clone()),
            },
            ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Text(request.user.clone()),
            },
        ],
        response_format: Some(ResponseFormat {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: request.schema_name.clone(),
                strict: true,
                schema: request.schema.clone(),
            },
        }),
        modalities: None,
    }
}

fn image_request_body<'a>(model: &'a str, prompt: &str, references: &[ImageAsset]) -> ChatRequest<'a> {
    let mut parts = vec![ContentPart::Text {
        text: prompt.to_string(),
    }];
    parts.extend(references.iter().map(|r| ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: r.to_data_url(),
        },
    }));

    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }],
        response_format: None,
        modalities: Some(vec!["image", "text"]),
    }
}

fn extract_plan_text(resp: &ChatResponse) -> Result<&str, ClientError> {
    resp.choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ClientError::MalformedResponse {
            provider: PROVIDER,
            detail: "response empty or missing content".to_string(),
        })
}

fn extract_first_image(resp: &ChatResponse) -> Result<ImageAsset, ClientError> {
    let image = resp
        .choices
        .first()
        .and_then(|c| c.message.images.first())
        .ok_or(ClientError::NoImage)?;
    ImageAsset::from_data_url(&image.image_url.url)
}

#[async_trait]
impl GenerativeClient for OpenRouterClient {
    async fn request_plan(&self, request: &PlanRequest) -> Result<Plan, ClientError> {
        let body = plan_request_body(&self.text_model, request);
        let resp = self.chat(&body).await?;
        let text = extract_plan_text(&resp)?;
        Ok(Plan::from_json(text)?)
    }

    async fn request_image(
        &self,
        prompt: &str,
        references: &[ImageAsset],
    ) -> Result<ImageAsset, ClientError> {
        let body = image_request_body(&self.image_model, prompt, references);
        let resp = self.chat(&body).await?;
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

    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    fn test_client(base_url: &str) -> OpenRouterClient {
        let config = OpenRouterConfig {
            base_url: base_url.to_string(),
            referer: Some("https://example.com".to_string()),
            ..Default::default()
        };
        OpenRouterClient::new("sk-test", &config)
    }

    fn plan_request() -> PlanRequest {
        PlanRequest {
            system: "system".to_string(),
            user: "story".to_string(),
            schema_name: "manga_plan".to_string(),
            schema: plan_schema(),
        }
    }

    #[test]
    fn test_plan_body_carries_strict_schema() {
        let request = plan_request();
        let body = serde_json::to_value(plan_request_body("m", &request)).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "story");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "manga_plan");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert!(body.get("modalities").is_none());
    }

    #[test]
    fn test_image_body_attaches_references_after_text() {
        let refs = vec![ImageAsset::new("image/png", vec![1, 2, 3])];
        let body = serde_json::to_value(image_request_body("m", "draw", &refs)).unwrap();
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0], json!({"type": "text", "text": "draw"}));
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AQID");
        assert_eq!(body["modalities"], json!(["image", "text"]));
    }

    #[test]
    fn test_openai_response_parsing_success() {
        let json = r#"{
            "id": "gen-123",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "{\"characters\": [], \"pages\": []}"},
                "finish_reason": "stop"
            }]
        }"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            extract_plan_text(&resp).unwrap(),
            r#"{"characters": [], "pages": []}"#
        );
    }

    #[test]
    fn test_response_without_images_is_no_image() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "I cannot draw that."}}]}"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(extract_first_image(&resp), Err(ClientError::NoImage)));
    }

    #[tokio::test]
    async fn test_request_plan_round_trip() {
        let server = MockServer::start().await;
        let content = json!({
            "characters": [{"name": "Unit-7", "visual_desc": "round robot"}],
            "pages": [{"page_number": 1, "layout_desc": "grid", "panels": [
                {"id": 1, "description": "d", "visual_prompt": "robot paints", "dialogue": ""}
            ]}]
        })
        .to_string();

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("HTTP-Referer", "https://example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let plan = client.request_plan(&plan_request()).await.unwrap();
        assert_eq!(plan.characters[0].name, "Unit-7");
        assert_eq!(plan.pages[0].panels[0].visual_prompt, "robot paints");
    }

    #[tokio::test]
    async fn test_request_plan_non_conforming_content_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "{\"pages\": \"nope\"}"}}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.request_plan(&plan_request()).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidPlan(_)));
    }

    #[tokio::test]
    async fn test_request_image_returns_first_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {
                    "role": "assistant",
                    "content": null,
                    "images": [
                        {"type": "image_url", "image_url": {"url": format!("data:image/png;base64,{}", PNG_B64)}},
                        {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,AAAA"}}
                    ]
                }}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let image = client.request_image("draw", &[]).await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert!(image.decode().is_ok());
    }

    #[tokio::test]
    async fn test_http_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.request_image("draw", &[]).await.unwrap_err();
        match err {
            ClientError::Api { status, body, .. } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
