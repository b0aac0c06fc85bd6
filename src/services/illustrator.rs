use crate::core::config::Config;
use crate::services::llm::{
    default_gemini_base_url, gemini_endpoint, GeminiContent, GeminiGenerationConfig, GeminiPart,
    GeminiRequest, GeminiResponse,
};
use crate::utils::data_uri::DataUri;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IllustrationConfig {
    #[serde(default = "default_illustration_provider")]
    pub provider: String,
    pub gemini: Option<GeminiImageConfig>,
}

impl Default for IllustrationConfig {
    fn default() -> Self {
        Self {
            provider: default_illustration_provider(),
            gemini: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiImageConfig {
    pub api_key: String,
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

fn default_illustration_provider() -> String {
    "gemini".to_string()
}
fn default_image_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

/// Stage two of the pipeline: draws one scene, with the child taken from the reference photo.
#[async_trait]
pub trait Illustrator: Send + Sync {
    async fn generate_image(&self, child_name: &str, photo: &DataUri, scene: &str) -> Result<DataUri>;
}

pub fn create_illustrator(config: &Config) -> Result<Box<dyn Illustrator>> {
    info!("Initializing illustrator for provider: {}", config.illustration.provider);
    match config.illustration.provider.as_str() {
        "gemini" => {
            // Reuse the story key when the illustration section only names a provider.
            let cfg = match (&config.illustration.gemini, &config.llm.gemini) {
                (Some(cfg), _) => cfg.clone(),
                (None, Some(llm)) => GeminiImageConfig {
                    api_key: llm.api_key.clone(),
                    model: default_image_model(),
                    base_url: llm.base_url.clone(),
                },
                (None, None) => return Err(anyhow!("Gemini illustration config missing")),
            };
            Ok(Box::new(GeminiIllustrator::new(cfg)?))
        }
        _ => Err(anyhow!("Unknown illustration provider: {}", config.illustration.provider)),
    }
}

pub struct GeminiIllustrator {
    api_key: String,
    endpoint: url::Url,
    client: reqwest::Client,
}

impl GeminiIllustrator {
    pub fn new(config: GeminiImageConfig) -> Result<Self> {
        Ok(Self {
            endpoint: gemini_endpoint(&config.base_url, &config.model)?,
            api_key: config.api_key,
            client: reqwest::Client::new(),
        })
    }

    fn build_request(child_name: &str, photo: &DataUri, scene: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![
                    GeminiPart::image(photo),
                    GeminiPart::text(&format!(
                        "Generate an image of {} in a scene described as: \"{}\"",
                        child_name, scene
                    )),
                ],
            }],
            system_instruction: None,
            generation_config: Some(GeminiGenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            }),
        }
    }

    fn extract_image(response: GeminiResponse) -> Result<DataUri> {
        response
            .first_parts()?
            .into_iter()
            .find_map(|p| p.inline_data)
            .map(|d| DataUri::new(&d.mime_type, &d.data))
            .ok_or_else(|| anyhow!("Image generation failed to produce an image"))
    }
}

#[async_trait]
impl Illustrator for GeminiIllustrator {
    async fn generate_image(&self, child_name: &str, photo: &DataUri, scene: &str) -> Result<DataUri> {
        debug!("Drawing scene: {}", scene);
        let request_body = Self::build_request(child_name, photo, scene);

        let resp = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Gemini image API error: {}", error_text));
        }

        let response_text = resp.text().await?;
        let result: GeminiResponse = serde_json::from_str(&response_text)
            .context("Failed to parse Gemini image response")?;
        Self::extract_image(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_image_skips_text_parts() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here is Mia in the forest." },
                        { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        let image = GeminiIllustrator::extract_image(response).unwrap();
        assert_eq!(image.to_string(), "data:image/png;base64,iVBORw0KGgo=");
    }

    #[test]
    fn test_text_only_response_is_an_error() {
        let json = r#"{
            "candidates": [{
                "content": { "parts": [ { "text": "I can't draw that." } ] },
                "finishReason": "STOP"
            }]
        }"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(GeminiIllustrator::extract_image(response).is_err());
    }

    #[test]
    fn test_request_carries_photo_and_scene() {
        let request = GeminiIllustrator::build_request(
            "Mia",
            &DataUri::new("image/jpeg", "/9j/"),
            "riding a dragon",
        );
        let value = serde_json::to_value(&request).unwrap();
        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["data"], "/9j/");
        assert_eq!(
            parts[1]["text"],
            "Generate an image of Mia in a scene described as: \"riding a dragon\""
        );
        assert_eq!(value["generationConfig"]["responseModalities"][0], "TEXT");
    }

    #[test]
    fn test_factory_falls_back_to_story_key() {
        let config: Config = serde_yaml_ng::from_str(
            "llm:\n  provider: gemini\n  gemini:\n    api_key: shared\n    model: gemini-2.0-flash\n",
        )
        .unwrap();
        assert!(create_illustrator(&config).is_ok());

        let config: Config = serde_yaml_ng::from_str(
            "llm:\n  provider: ollama\n  ollama:\n    base_url: http://localhost:11434\n    model: llama3\n",
        )
        .unwrap();
        assert!(create_illustrator(&config).is_err());
    }
}
