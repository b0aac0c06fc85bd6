use crate::core::config::Config;
use crate::core::state::{GenerationRequest, StoryCategory};
use crate::services::story::StoryGenerator;
use crate::utils::data_uri::DataUri;
use anyhow::Result;
use inquire::validator::{Validation, ValueRequiredValidator};
use inquire::{Confirm, CustomType, CustomUserError, Select, Text};
use log::warn;
use std::path::Path;

const ANY_CATEGORY: &str = "Surprise me";

/// Asks for everything the story needs about the child.
pub async fn collect_request(config: &Config, story: &dyn StoryGenerator) -> Result<GenerationRequest> {
    let child_name = required("Child's name:")?;

    let child_age = CustomType::<u32>::new("Child's age:")
        .with_error_message("Please enter an age in years")
        .with_validator(|age: &u32| -> Result<Validation, CustomUserError> {
            if (1..=12).contains(age) {
                Ok(Validation::Valid)
            } else {
                Ok(Validation::Invalid("Stories are written for ages 1 to 12".into()))
            }
        })
        .prompt()?;

    let photo = loop {
        let path = required("Path to a photo of the child:")?;
        match DataUri::from_file(Path::new(path.trim())).await {
            Ok(photo) => break photo,
            Err(e) => println!("{:#}", e),
        }
    };

    let favorite_foods = required("Favorite foods:")?;
    let preferred_characters = required("Favorite cartoon characters:")?;
    let mut interests = required("Interests and personality:")?;

    if !config.unattended {
        interests = maybe_improve(story, interests).await?;
    }

    let mut options = vec![ANY_CATEGORY.to_string()];
    options.extend(StoryCategory::ALL.iter().map(|c| c.to_string()));
    let picked = Select::new("Story category:", options).prompt()?;
    let category = StoryCategory::ALL.into_iter().find(|c| c.to_string() == picked);

    Ok(GenerationRequest {
        child_name,
        child_age,
        photo,
        favorite_foods,
        preferred_characters,
        interests,
        category,
    })
}

fn required(message: &str) -> Result<String> {
    let answer = Text::new(message)
        .with_validator(ValueRequiredValidator::default())
        .prompt()?;
    Ok(answer.trim().to_string())
}

async fn maybe_improve(story: &dyn StoryGenerator, interests: String) -> Result<String> {
    let wants = Confirm::new("Let the storyteller polish that description?")
        .with_default(false)
        .prompt()?;
    if !wants {
        return Ok(interests);
    }

    match story.improve_prompt(&interests).await {
        Ok(improved) => {
            println!("\n{}\n", improved);
            let keep = Confirm::new("Use this version?").with_default(true).prompt()?;
            Ok(if keep { improved } else { interests })
        }
        Err(e) => {
            warn!("Could not improve the description: {:#}", e);
            println!("Keeping your description as written.");
            Ok(interests)
        }
    }
}
