use crate::core::config::Config;
use crate::utils::data_uri::DataUri;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String, // "gemini", "ollama" or "openai"
    pub gemini: Option<GeminiConfig>,
    pub ollama: Option<OllamaConfig>,
    pub openai: Option<OpenAIConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

pub fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn chat(&self, system: &str, user: &str) -> Result<String>;

    /// Chat with a reference image attached. Providers without vision input ignore the image.
    async fn chat_with_image(&self, system: &str, user: &str, image: &DataUri) -> Result<String> {
        debug!("Provider has no image input, dropping {:?}", image);
        self.chat(system, user).await
    }
}

pub fn create_llm(config: &Config) -> Result<Box<dyn LlmClient>> {
    match config.llm.provider.as_str() {
        "gemini" => {
            let cfg = config.llm.gemini.as_ref().context("Gemini config missing")?;
            Ok(Box::new(GeminiClient::new(&cfg.api_key, &cfg.model, &cfg.base_url)?))
        }
        "ollama" => {
            let cfg = config.llm.ollama.as_ref().context("Ollama config missing")?;
            Ok(Box::new(OllamaClient::new(&cfg.base_url, &cfg.model)))
        }
        "openai" => {
            let cfg = config.llm.openai.as_ref().context("OpenAI config missing")?;
            Ok(Box::new(OpenAIClient::new(&cfg.api_key, &cfg.model, cfg.base_url.as_deref())))
        }
        _ => Err(anyhow!("Unknown LLM provider: {}", config.llm.provider)),
    }
}

// --- Gemini ---

/// Builds `<base>/models/<model>:generateContent`, validating the base URL up front.
pub fn gemini_endpoint(base_url: &str, model: &str) -> Result<url::Url> {
    let base = url::Url::parse(base_url.trim_end_matches('/'))
        .with_context(|| format!("Invalid Gemini base URL: {}", base_url))?;
    let url = format!("{}/models/{}:generateContent", base.as_str().trim_end_matches('/'), model);
    Ok(url::Url::parse(&url)?)
}

#[derive(Debug)]
struct GeminiClient {
    api_key: String,
    endpoint: url::Url,
    client: reqwest::Client,
}

impl GeminiClient {
    fn new(api_key: &str, model: &str, base_url: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            endpoint: gemini_endpoint(base_url, model)?,
            client: reqwest::Client::new(),
        })
    }

    async fn generate(&self, system: &str, parts: Vec<GeminiPart>) -> Result<String> {
        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts,
            }],
            system_instruction: Some(GeminiSystemInstruction {
                parts: vec![GeminiPart::text(system)],
            }),
            generation_config: None,
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Gemini API error: {}", error_text));
        }

        let response_text = resp.text().await?;
        let result: GeminiResponse = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => return Err(anyhow!("Failed to parse Gemini response: {}. Body: {}", e, response_text)),
        };

        result.first_text()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
pub(crate) struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
pub(crate) struct GeminiSystemInstruction {
    pub parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiGenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<GeminiInlineData>,
}

impl GeminiPart {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    pub fn image(image: &DataUri) -> Self {
        Self {
            text: None,
            inline_data: Some(GeminiInlineData {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            }),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiInlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Deserialize)]
pub(crate) struct GeminiResponse {
    pub candidates: Option<Vec<GeminiCandidate>>,
    pub error: Option<GeminiError>,
}

#[derive(Deserialize)]
pub(crate) struct GeminiCandidate {
    pub content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct GeminiContentResponse {
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct GeminiError {
    pub message: String,
}

impl GeminiResponse {
    /// Parts of the first candidate, or an error explaining why there are none.
    pub fn first_parts(self) -> Result<Vec<GeminiPart>> {
        if let Some(err) = self.error {
            return Err(anyhow!("Gemini API returned error: {}", err.message));
        }

        let first = self
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| anyhow!("Gemini response has no candidates"))?;

        match first.content {
            Some(content) if !content.parts.is_empty() => Ok(content.parts),
            _ => {
                let reason = first.finish_reason.as_deref().unwrap_or("UNKNOWN");
                Err(anyhow!("Gemini response empty. Finish reason: {}", reason))
            }
        }
    }

    fn first_text(self) -> Result<String> {
        let text: String = self
            .first_parts()?
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        if text.is_empty() {
            return Err(anyhow!("Gemini response contained no text"));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        self.generate(system, vec![GeminiPart::text(user)]).await
    }

    async fn chat_with_image(&self, system: &str, user: &str, image: &DataUri) -> Result<String> {
        self.generate(system, vec![GeminiPart::image(image), GeminiPart::text(user)])
            .await
    }
}

// --- Ollama ---

#[derive(Debug)]
struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn send(&self, messages: Vec<OllamaMessage>) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request_body = OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: false,
        };

        let resp = self.client.post(&url).json(&request_body).send().await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Ollama API error: {}", error_text));
        }

        let result: OllamaResponse = resp.json().await?;
        Ok(result.message.content)
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessageResponse,
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    content: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        self.send(vec![
            OllamaMessage { role: "system".to_string(), content: system.to_string(), images: vec![] },
            OllamaMessage { role: "user".to_string(), content: user.to_string(), images: vec![] },
        ])
        .await
    }

    // Ollama takes bare base64 images on the message.
    async fn chat_with_image(&self, system: &str, user: &str, image: &DataUri) -> Result<String> {
        self.send(vec![
            OllamaMessage { role: "system".to_string(), content: system.to_string(), images: vec![] },
            OllamaMessage {
                role: "user".to_string(),
                content: user.to_string(),
                images: vec![image.data.clone()],
            },
        ])
        .await
    }
}

// --- OpenAI ---

#[derive(Debug)]
struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIClient {
    fn new(api_key: &str, model: &str, base_url: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.unwrap_or("https://api.openai.com/v1").trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAIMessage { role: "system".to_string(), content: system.to_string() },
                OpenAIMessage { role: "user".to_string(), content: user.to_string() },
            ],
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("OpenAI API error: {}", error_text));
        }

        let result: OpenAIResponse = resp.json().await?;
        if let Some(choice) = result.choices.first() {
            if let Some(content) = &choice.message.content {
                return Ok(content.clone());
            }
        }

        Err(anyhow!("OpenAI response empty or missing content"))
    }
}
