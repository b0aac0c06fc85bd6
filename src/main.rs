use anyhow::{bail, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use storymagic::core::config::Config;
use storymagic::core::io::NativeStorage;
use storymagic::core::state::PipelineState;
use storymagic::services::export::export_storybook;
use storymagic::services::illustrator::{create_illustrator, Illustrator};
use storymagic::services::llm::create_llm;
use storymagic::services::notify::LogNotifier;
use storymagic::services::pagination::Storybook;
use storymagic::services::pipeline::{StoryPipeline, Submission};
use storymagic::services::setup;
use storymagic::services::story::{LlmStoryGenerator, StoryGenerator};
use storymagic::ui;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid LLM settings.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    // 1. Clients
    let llm = create_llm(&config)?;
    let story: Arc<dyn StoryGenerator> = Arc::new(LlmStoryGenerator::new(llm, &config.story.language));
    let illustrator: Arc<dyn Illustrator> = Arc::from(create_illustrator(&config)?);

    // 2. About the child
    let request = setup::collect_request(&config, story.as_ref()).await?;
    let child_name = request.child_name.clone();

    // 3. Story, then pictures
    let pipeline = StoryPipeline::new(story, illustrator, Arc::new(LogNotifier::new(true)));
    let mut updates = pipeline.subscribe();

    println!("Weaving your magical tale...");
    let images = match pipeline.submit(request).await? {
        Submission::Started(images) => images,
        Submission::Superseded => bail!("Story request was superseded"),
    };
    let run = images.run();

    let mut book = Storybook::from_snapshot(&pipeline.snapshot());
    for (i, page) in book.pages().iter().enumerate() {
        println!("\n{}. {}", i + 1, page);
    }
    println!();

    let pb = ProgressBar::new(images.story().scene_prompts.len() as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pictures {msg}")?
        .progress_chars("#>-"));

    let waiting = images.wait();
    tokio::pin!(waiting);
    loop {
        tokio::select! {
            finished = &mut waiting => {
                finished?;
                break;
            }
            Some(snapshot) = updates.next() => {
                if snapshot.run == run {
                    book.refresh(&snapshot);
                    pb.set_position(snapshot.finished_slots() as u64);
                }
            }
        }
    }

    let snapshot = pipeline.snapshot();
    book.refresh(&snapshot);
    pb.finish_with_message("Drawing complete");
    if snapshot.state != PipelineState::Complete {
        bail!("Picture drawing stopped early");
    }

    // 4. Save and read
    let storage = NativeStorage::new();
    let exported = export_storybook(&storage, &config.output_folder, &child_name, &snapshot).await?;
    println!("Storybook saved to {}", exported.story_file);

    if !config.unattended {
        ui::read_storybook(&mut book, &format!("{}'s Magical Story!", child_name), &exported.images)?;
    }

    Ok(())
}
