use crate::core::state::{GenerationRequest, ImageSlot, PipelineSnapshot, PipelineState, StoryResult};
use crate::services::illustrator::Illustrator;
use crate::services::notify::{Notifier, Severity};
use crate::services::story::StoryGenerator;
use anyhow::{Context, Result};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct Shared {
    snapshot: PipelineSnapshot,
    subscribers: Vec<mpsc::UnboundedSender<PipelineSnapshot>>,
}

impl Shared {
    fn publish(&mut self) {
        let snapshot = &self.snapshot;
        self.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

/// Drives story generation, then one illustration per scene prompt, publishing a snapshot after
/// every change.
///
/// Each `submit` starts a new run and supersedes the previous one. Results that arrive for a
/// superseded run are dropped without touching state or notifying anyone.
#[derive(Clone)]
pub struct StoryPipeline {
    story: Arc<dyn StoryGenerator>,
    illustrator: Arc<dyn Illustrator>,
    notifier: Arc<dyn Notifier>,
    shared: Arc<Mutex<Shared>>,
}

pub enum Submission {
    /// Story is ready and the image loop is running.
    Started(ImageRun),
    /// A newer submission arrived while the story was being written.
    Superseded,
}

pub struct ImageRun {
    run: u64,
    story: Arc<StoryResult>,
    handle: JoinHandle<()>,
}

impl ImageRun {
    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn story(&self) -> &StoryResult {
        &self.story
    }

    /// Waits for the image loop to finish, or to notice it was superseded.
    pub async fn wait(self) -> Result<()> {
        self.handle.await.context("Image loop aborted")
    }
}

impl StoryPipeline {
    pub fn new(
        story: Arc<dyn StoryGenerator>,
        illustrator: Arc<dyn Illustrator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            story,
            illustrator,
            notifier,
            shared: Arc::new(Mutex::new(Shared {
                snapshot: PipelineSnapshot::default(),
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.lock().snapshot.clone()
    }

    /// Every snapshot published from now on, starting with the current one.
    pub fn subscribe(&self) -> BoxStream<'static, PipelineSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut shared = self.lock();
        if tx.send(shared.snapshot.clone()).is_ok() {
            shared.subscribers.push(tx);
        }
        futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|snapshot| (snapshot, rx))
        })
        .boxed()
    }

    fn is_active(&self, run: u64) -> bool {
        self.lock().snapshot.run == run
    }

    /// Applies `apply` only if `run` is still the active run. Returns whether it was applied.
    fn update(&self, run: u64, apply: impl FnOnce(&mut PipelineSnapshot)) -> bool {
        let mut shared = self.lock();
        if shared.snapshot.run != run {
            return false;
        }
        apply(&mut shared.snapshot);
        shared.publish();
        true
    }

    /// Notifies only while `run` is still the active run. The lock is held across the call so a
    /// newer `submit` cannot slip in between the check and the message.
    fn notify(&self, run: u64, severity: Severity, title: &str, message: &str) -> bool {
        let shared = self.lock();
        if shared.snapshot.run != run {
            return false;
        }
        self.notifier.notify(severity, title, message);
        true
    }

    fn begin(&self) -> u64 {
        let mut shared = self.lock();
        let run = shared.snapshot.run + 1;
        shared.snapshot = PipelineSnapshot {
            run,
            state: PipelineState::GeneratingStory,
            story: None,
            slots: Vec::new(),
        };
        shared.publish();
        run
    }

    pub async fn submit(&self, request: GenerationRequest) -> Result<Submission> {
        let run = self.begin();
        info!("Run {}: writing story for {}", run, request.child_name);

        let story = match self.story.generate_story(&request).await {
            Ok(story) => Arc::new(story),
            Err(e) => {
                let applied = self.update(run, |s| {
                    s.state = PipelineState::Failed;
                    s.story = None;
                    s.slots.clear();
                });
                if !applied {
                    debug!("Run {}: dropping story failure of superseded run: {:#}", run, e);
                    return Ok(Submission::Superseded);
                }
                let notified = self.notify(
                    run,
                    Severity::Error,
                    "Oops!",
                    "Something went wrong creating the story. Please try again.",
                );
                if !notified {
                    debug!("Run {}: dropping story failure of superseded run: {:#}", run, e);
                    return Ok(Submission::Superseded);
                }
                self.update(run, |s| s.state = PipelineState::Idle);
                return Err(e.context("Story generation failed"));
            }
        };

        let applied = self.update(run, |s| {
            s.state = PipelineState::GeneratingImages;
            s.story = Some(story.clone());
            s.slots = story.scene_prompts.iter().map(ImageSlot::new).collect();
        });
        if !applied {
            debug!("Run {}: dropping story of superseded run", run);
            return Ok(Submission::Superseded);
        }
        let notified = self.notify(
            run,
            Severity::Success,
            "Story Created!",
            "Your magical adventure awaits!",
        );
        if !notified {
            debug!("Run {}: superseded right after its story was published", run);
            return Ok(Submission::Superseded);
        }

        let pipeline = self.clone();
        let loop_story = story.clone();
        let handle = tokio::spawn(async move {
            pipeline.illustrate(run, request, loop_story).await;
        });

        Ok(Submission::Started(ImageRun { run, story, handle }))
    }

    // One request at a time: the illustration API is rate limited and each call re-sends the photo.
    async fn illustrate(&self, run: u64, request: GenerationRequest, story: Arc<StoryResult>) {
        let total = story.scene_prompts.len();
        for (index, scene) in story.scene_prompts.iter().enumerate() {
            if !self.is_active(run) {
                debug!("Run {}: superseded before picture {}", run, index + 1);
                return;
            }

            let outcome = self
                .illustrator
                .generate_image(&request.child_name, &request.photo, scene)
                .await;

            match outcome {
                Ok(image) => {
                    let applied = self.update(run, |s| {
                        if let Some(slot) = s.slots.get_mut(index) {
                            slot.fill(image);
                        }
                    });
                    if !applied {
                        debug!("Run {}: dropping picture {} of superseded run", run, index + 1);
                        return;
                    }
                    info!("Run {}: picture {}/{} ready", run, index + 1, total);
                }
                Err(e) => {
                    let applied = self.update(run, |s| {
                        if let Some(slot) = s.slots.get_mut(index) {
                            slot.mark_failed();
                        }
                    });
                    if !applied {
                        debug!("Run {}: dropping failure of superseded run: {:#}", run, e);
                        return;
                    }
                    warn!("Run {}: picture {}/{} failed: {:#}", run, index + 1, total, e);
                    self.notify(
                        run,
                        Severity::Error,
                        "Image Glitch!",
                        &format!("Could not draw picture {}.", index + 1),
                    );
                }
            }
        }

        if self.update(run, |s| s.state = PipelineState::Complete) {
            info!("Run {}: all pictures attempted", run);
        }
    }
}
