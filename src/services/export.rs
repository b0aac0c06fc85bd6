use crate::core::io::Storage;
use crate::core::state::PipelineSnapshot;
use crate::services::pagination::split_pages;
use anyhow::{anyhow, Result};
use log::info;
use std::fmt::Write;
use std::path::Path;

pub struct ExportedBook {
    pub folder: String,
    pub story_file: String,
    /// Image file per page, `None` where the page has no picture.
    pub images: Vec<Option<String>>,
}

fn slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "story".to_string()
    } else {
        slug
    }
}

async fn free_folder(storage: &dyn Storage, output_folder: &str, base: &str) -> Result<String> {
    let root = Path::new(output_folder);
    let mut candidate = root.join(base);
    let mut n = 2;
    while storage.exists(&candidate.to_string_lossy()).await? {
        candidate = root.join(format!("{}-{}", base, n));
        n += 1;
    }
    Ok(candidate.to_string_lossy().to_string())
}

/// Writes `story.md` and one image file per illustrated page into a fresh folder.
pub async fn export_storybook(
    storage: &dyn Storage,
    output_folder: &str,
    child_name: &str,
    snapshot: &PipelineSnapshot,
) -> Result<ExportedBook> {
    let story = snapshot
        .story
        .as_ref()
        .ok_or_else(|| anyhow!("There is no story to save"))?;
    let pages = split_pages(&story.story_text);

    let folder = free_folder(storage, output_folder, &slug(child_name)).await?;
    let mut images = Vec::with_capacity(pages.len());
    let mut markdown = format!("# {}'s Magical Story!\n", child_name);

    for (i, text) in pages.iter().enumerate() {
        write!(markdown, "\n## Page {}\n\n", i + 1)?;

        let image = snapshot.slots.get(i).and_then(|s| s.result.as_ref());
        let file = match image {
            Some(image) => {
                let name = format!("page_{:02}.{}", i + 1, image.extension());
                let path = Path::new(&folder).join(&name);
                storage.write(&path.to_string_lossy(), &image.decode()?).await?;
                write!(markdown, "![Page {}]({})\n\n", i + 1, name)?;
                Some(path.to_string_lossy().to_string())
            }
            None => None,
        };
        images.push(file);

        writeln!(markdown, "{}", text)?;
    }

    let story_file = Path::new(&folder).join("story.md").to_string_lossy().to_string();
    storage.write(&story_file, markdown.as_bytes()).await?;
    info!("Saved storybook to {}", folder);

    Ok(ExportedBook {
        folder,
        story_file,
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;
    use crate::core::state::{ImageSlot, PipelineState, StoryResult};
    use crate::utils::data_uri::DataUri;
    use std::sync::Arc;

    #[test]
    fn test_slug() {
        assert_eq!(slug("Mia Rose"), "mia-rose");
        assert_eq!(slug("  O'Brien!! "), "o-brien");
        assert_eq!(slug("???"), "story");
    }

    fn finished_snapshot() -> PipelineSnapshot {
        let mut first = ImageSlot::new("castle");
        first.fill(DataUri::from_bytes("image/png", b"png bytes"));
        let mut second = ImageSlot::new("dragon");
        second.mark_failed();

        PipelineSnapshot {
            run: 1,
            state: PipelineState::Complete,
            story: Some(Arc::new(StoryResult {
                story_text: "Mia found a castle.\n\nA dragon waved.\nThey had tea.".to_string(),
                scene_prompts: vec!["castle".to_string(), "dragon".to_string()],
            })),
            slots: vec![first, second],
        }
    }

    #[tokio::test]
    async fn test_export_writes_story_and_images() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().to_string_lossy().to_string();
        let storage = NativeStorage::new();

        let book = export_storybook(&storage, &output, "Mia", &finished_snapshot()).await?;

        assert!(book.folder.ends_with("mia"));
        assert_eq!(book.images.len(), 3);
        assert!(book.images[0].as_deref().is_some_and(|p| p.ends_with("page_01.png")));
        assert!(book.images[1].is_none());
        assert!(book.images[2].is_none());

        let picture = storage.read(book.images[0].as_deref().unwrap()).await?;
        assert_eq!(picture, b"png bytes");

        let markdown = String::from_utf8(storage.read(&book.story_file).await?)?;
        assert!(markdown.starts_with("# Mia's Magical Story!"));
        assert!(markdown.contains("![Page 1](page_01.png)"));
        assert!(markdown.contains("## Page 3\n\nThey had tea."));
        Ok(())
    }

    #[tokio::test]
    async fn test_export_never_overwrites() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().to_string_lossy().to_string();
        let storage = NativeStorage::new();

        let first = export_storybook(&storage, &output, "Mia", &finished_snapshot()).await?;
        let second = export_storybook(&storage, &output, "Mia", &finished_snapshot()).await?;
        assert_ne!(first.folder, second.folder);
        assert!(second.folder.ends_with("mia-2"));
        Ok(())
    }

    #[tokio::test]
    async fn test_export_without_story_fails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = NativeStorage::new();
        let result = export_storybook(
            &storage,
            &dir.path().to_string_lossy(),
            "Mia",
            &PipelineSnapshot::default(),
        )
        .await;
        assert!(result.is_err());
    }
}
