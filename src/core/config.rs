use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::services::illustrator::IllustrationConfig;
use crate::services::llm::LlmConfig;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub unattended: bool,

    pub llm: LlmConfig,

    #[serde(default)]
    pub illustration: IllustrationConfig,

    #[serde(default)]
    pub story: StoryConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoryConfig {
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_language() -> String {
    "English".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.yml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }
}
