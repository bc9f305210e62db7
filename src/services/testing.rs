//! Scripted client used by the service tests.

use crate::core::asset::ImageAsset;
use crate::core::error::ClientError;
use crate::core::plan::{Character, Page, Panel, Plan};
use crate::services::client::{GenerativeClient, PlanRequest};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct ImageCall {
    pub prompt: String,
    pub reference_count: usize,
}

#[derive(Debug, Default)]
pub struct ScriptedClient {
    plan: Option<Plan>,
    failing: Vec<String>,
    corrupt: Vec<String>,
    plan_requests: Arc<Mutex<Vec<String>>>,
    image_calls: Arc<Mutex<Vec<ImageCall>>>,
}

impl ScriptedClient {
    /// `None` makes every planning request fail.
    pub fn new(plan: Option<Plan>) -> Self {
        Self {
            plan,
            ..Default::default()
        }
    }

    /// Image requests whose prompt contains `fragment` fail.
    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.failing.push(fragment.to_string());
        self
    }

    /// Image requests whose prompt contains `fragment` return bytes that
    /// are not an image.
    pub fn corrupt_on(mut self, fragment: &str) -> Self {
        self.corrupt.push(fragment.to_string());
        self
    }

    pub fn plan_requests(&self) -> Vec<String> {
        self.plan_requests.lock().unwrap().clone()
    }

    pub fn image_calls(&self) -> Vec<ImageCall> {
        self.image_calls.lock().unwrap().clone()
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.image_calls().into_iter().map(|c| c.prompt).collect()
    }

    /// Two characters and one page per entry of `panels_per_page`;
    /// panel prompts read "page {p} panel {i} scene".
    pub fn sample_plan(panels_per_page: &[usize]) -> Plan {
        let characters = vec![
            Character {
                name: "Unit-7".to_string(),
                visual_desc: "small round robot with a paint-splattered chassis".to_string(),
            },
            Character {
                name: "Mira".to_string(),
                visual_desc: "elderly painter in a blue smock".to_string(),
            },
        ];
        let pages = panels_per_page
            .iter()
            .enumerate()
            .map(|(p, &count)| {
                let page_number = p as u32 + 1;
                Page {
                    page_number,
                    layout_desc: format!("layout of page {}", page_number),
                    panels: (1..=count as i64)
                        .map(|id| Panel {
                            id,
                            description: format!("beat {}", id),
                            visual_prompt: format!("page {} panel {} scene", page_number, id),
                            dialogue: None,
                        })
                        .collect(),
                }
            })
            .collect();
        Plan { characters, pages }
    }
}

pub fn png_asset(width: u32, height: u32, color: [u8; 3]) -> ImageAsset {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    ImageAsset::new("image/png", buf)
}

#[async_trait]
impl GenerativeClient for ScriptedClient {
    async fn request_plan(&self, request: &PlanRequest) -> Result<Plan, ClientError> {
        self.plan_requests.lock().unwrap().push(request.user.clone());
        match &self.plan {
            Some(plan) => Ok(plan.clone()),
            None => Err(ClientError::MalformedResponse {
                provider: "Scripted",
                detail: "no plan scripted".to_string(),
            }),
        }
    }

    async fn request_image(
        &self,
        prompt: &str,
        references: &[ImageAsset],
    ) -> Result<ImageAsset, ClientError> {
        self.image_calls.lock().unwrap().push(ImageCall {
            prompt: prompt.to_string(),
            reference_count: references.len(),
        });
        // Let concurrent siblings interleave.
        tokio::task::yield_now().await;

        if self.failing.iter().any(|f| prompt.contains(f.as_str())) {
            return Err(ClientError::NoImage);
        }
        if self.corrupt.iter().any(|f| prompt.contains(f.as_str())) {
            return Ok(ImageAsset::new("image/png", b"not an image".to_vec()));
        }
        Ok(png_asset(16, 12, [200, 40, 40]))
    }
}
