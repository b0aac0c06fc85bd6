use crate::utils::data_uri::DataUri;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoryCategory {
    Fantasy,
    Adventure,
    Animals,
    Bedtime,
}

impl StoryCategory {
    pub const ALL: [StoryCategory; 4] = [
        StoryCategory::Fantasy,
        StoryCategory::Adventure,
        StoryCategory::Animals,
        StoryCategory::Bedtime,
    ];
}

impl fmt::Display for StoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoryCategory::Fantasy => "Fantasy",
            StoryCategory::Adventure => "Adventure",
            StoryCategory::Animals => "Animals",
            StoryCategory::Bedtime => "Bedtime",
        };
        f.write_str(name)
    }
}

/// Snapshot of everything the user told us about the child. Never mutated after submission.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub child_name: String,
    pub child_age: u32,
    pub photo: DataUri,
    pub favorite_foods: String,
    pub preferred_characters: String,
    pub interests: String,
    pub category: Option<StoryCategory>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoryResult {
    #[serde(rename = "storyText")]
    pub story_text: String,
    #[serde(rename = "imagePrompts", default)]
    pub scene_prompts: Vec<String>,
}

/// One illustration slot per scene prompt, at the same index.
///
/// `result` is only ever set on a slot that has been attempted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSlot {
    pub prompt: String,
    pub result: Option<DataUri>,
    pub attempted: bool,
}

impl ImageSlot {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            result: None,
            attempted: false,
        }
    }

    pub fn fill(&mut self, image: DataUri) {
        self.attempted = true;
        self.result = Some(image);
    }

    pub fn mark_failed(&mut self) {
        self.attempted = true;
        self.result = None;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    GeneratingStory,
    GeneratingImages,
    Complete,
    Failed,
}

/// What observers of the pipeline see after every mutation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineSnapshot {
    /// Identity of the request this snapshot belongs to. Zero before the first submission.
    pub run: u64,
    pub state: PipelineState,
    pub story: Option<Arc<StoryResult>>,
    pub slots: Vec<ImageSlot>,
}

impl PipelineSnapshot {
    pub fn finished_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.attempted).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_result_parsing() {
        let json = r#"{
            "storyText": "Once upon a time.\nThe end.",
            "imagePrompts": ["a castle", "a dragon"]
        }"#;
        let story: StoryResult = serde_json::from_str(json).unwrap();
        assert_eq!(story.scene_prompts.len(), 2);
        assert!(story.story_text.starts_with("Once"));
    }

    #[test]
    fn test_slot_lifecycle() {
        let mut slot = ImageSlot::new("a castle");
        assert!(!slot.attempted);
        assert!(slot.result.is_none());

        slot.mark_failed();
        assert!(slot.attempted);
        assert!(slot.result.is_none());

        slot.fill(DataUri::new("image/png", "AAAA"));
        assert!(slot.attempted);
        assert!(slot.result.is_some());
    }
}
