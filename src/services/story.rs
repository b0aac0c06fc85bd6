use crate::core::state::{GenerationRequest, StoryResult};
use crate::services::llm::LlmClient;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::info;

/// Stage one of the pipeline: turns a request into story text plus one scene prompt per page.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    async fn generate_story(&self, request: &GenerationRequest) -> Result<StoryResult>;

    /// Rewrites a free-text description so it makes for a more imaginative story.
    async fn improve_prompt(&self, prompt: &str) -> Result<String>;
}

pub struct LlmStoryGenerator {
    llm: Box<dyn LlmClient>,
    language: String,
}

impl LlmStoryGenerator {
    pub fn new(llm: Box<dyn LlmClient>, language: &str) -> Self {
        Self {
            llm,
            language: language.to_string(),
        }
    }

    pub fn get_system_prompt(&self) -> String {
        "You are a creative children's story writer. Reply with valid JSON only.".to_string()
    }

    pub fn generate_prompt(&self, request: &GenerationRequest) -> String {
        let category = request
            .category
            .map(|c| c.to_string())
            .unwrap_or_else(|| "General".to_string());

        format!(
            "Write a personalized story based on the details provided about the child.\
            \n\nChild's Name: {}\
            \nChild's Age: {}\
            \nChild's Photo: attached\
            \nFavorite Foods: {}\
            \nPreferred Cartoon Characters: {}\
            \nChild's Interests: {}\
            \nStory Category: {}\
            \nLanguage: {}\
            \n\nWrite a story that is age-appropriate and incorporates the child's name, interests and favorite things.\
            \nPut each section of the story on its own line, separated by a blank line; every section becomes one page.\
            \nFor every section, add a descriptive prompt to \"imagePrompts\" that can be used to draw the picture for that page.\
            \n\nReturn only this JSON object: {{ \"storyText\": \"...\", \"imagePrompts\": [\"...\"] }}",
            request.child_name,
            request.child_age,
            request.favorite_foods,
            request.preferred_characters,
            request.interests,
            category,
            self.language,
        )
    }

    pub fn parse_response(&self, response: &str) -> Result<StoryResult> {
        let clean_json = strip_code_blocks(response);
        let story: StoryResult = serde_json::from_str(&clean_json)
            .with_context(|| format!("Failed to parse story JSON: {}", clean_json))?;

        if story.story_text.trim().is_empty() {
            return Err(anyhow!("Model returned an empty story"));
        }
        Ok(story)
    }
}

#[async_trait]
impl StoryGenerator for LlmStoryGenerator {
    async fn generate_story(&self, request: &GenerationRequest) -> Result<StoryResult> {
        info!("Writing a story for {}", request.child_name);
        let prompt = self.generate_prompt(request);
        let response = self
            .llm
            .chat_with_image(&self.get_system_prompt(), &prompt, &request.photo)
            .await?;
        let story = self.parse_response(&response)?;
        info!("Story ready with {} scene prompts", story.scene_prompts.len());
        Ok(story)
    }

    async fn improve_prompt(&self, prompt: &str) -> Result<String> {
        let user = format!(
            "Your task is to take the given story prompt and enhance it to be more engaging and imaginative.\
            \nReply with the improved prompt only.\
            \n\nOriginal Story Prompt: {}\
            \n\nImproved Story Prompt:",
            prompt
        );
        let improved = self
            .llm
            .chat("You are a creative writing expert.", &user)
            .await?;
        let improved = improved.trim();
        if improved.is_empty() {
            return Err(anyhow!("Model returned an empty prompt"));
        }
        Ok(improved.to_string())
    }
}

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}
