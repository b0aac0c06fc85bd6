use crate::core::state::{ImageSlot, PipelineState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageImageStatus {
    /// Nothing requested yet.
    Initial,
    Loading,
    Loaded,
    Error,
    /// The story has more pages than scene prompts.
    NoImageExpected,
}

/// Derives the image status of every page from the raw pipeline state.
///
/// Checks run in a fixed order so every page gets exactly one status:
/// a page without a slot expects no image, a filled slot is loaded, an empty slot is loading
/// while images are being generated and an error once the run is complete. Anything else has
/// not started yet.
pub fn project(slots: &[ImageSlot], state: PipelineState, page_count: usize) -> Vec<PageImageStatus> {
    (0..page_count)
        .map(|page| page_status(slots.get(page), state))
        .collect()
}

pub fn page_status(slot: Option<&ImageSlot>, state: PipelineState) -> PageImageStatus {
    let Some(slot) = slot else {
        return PageImageStatus::NoImageExpected;
    };
    if slot.result.is_some() {
        return PageImageStatus::Loaded;
    }
    match state {
        PipelineState::GeneratingImages => PageImageStatus::Loading,
        PipelineState::Complete => PageImageStatus::Error,
        PipelineState::Idle | PipelineState::GeneratingStory | PipelineState::Failed => {
            PageImageStatus::Initial
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::data_uri::DataUri;

    fn loaded(prompt: &str) -> ImageSlot {
        let mut slot = ImageSlot::new(prompt);
        slot.fill(DataUri::new("image/png", prompt));
        slot
    }

    fn failed(prompt: &str) -> ImageSlot {
        let mut slot = ImageSlot::new(prompt);
        slot.mark_failed();
        slot
    }

    const ALL_STATES: [PipelineState; 5] = [
        PipelineState::Idle,
        PipelineState::GeneratingStory,
        PipelineState::GeneratingImages,
        PipelineState::Complete,
        PipelineState::Failed,
    ];

    #[test]
    fn test_complete_run_with_one_failure() {
        let slots = vec![loaded("p0"), failed("p1"), loaded("p2")];
        assert_eq!(
            project(&slots, PipelineState::Complete, 3),
            vec![PageImageStatus::Loaded, PageImageStatus::Error, PageImageStatus::Loaded]
        );
    }

    #[test]
    fn test_more_pages_than_prompts() {
        let slots = vec![loaded("p0"), ImageSlot::new("p1")];
        assert_eq!(
            project(&slots, PipelineState::GeneratingImages, 4),
            vec![
                PageImageStatus::Loaded,
                PageImageStatus::Loading,
                PageImageStatus::NoImageExpected,
                PageImageStatus::NoImageExpected,
            ]
        );
    }

    #[test]
    fn test_more_prompts_than_pages() {
        let slots = vec![loaded("p0"), loaded("p1"), loaded("p2")];
        assert_eq!(project(&slots, PipelineState::Complete, 2).len(), 2);
        assert!(project(&slots, PipelineState::Complete, 0).is_empty());
    }

    #[test]
    fn test_empty_slots_by_state() {
        let slots = vec![ImageSlot::new("p0"), failed("p1")];
        assert_eq!(
            project(&slots, PipelineState::GeneratingImages, 2),
            vec![PageImageStatus::Loading, PageImageStatus::Loading]
        );
        assert_eq!(
            project(&slots, PipelineState::Complete, 2),
            vec![PageImageStatus::Error, PageImageStatus::Error]
        );
        assert_eq!(
            project(&slots, PipelineState::GeneratingStory, 2),
            vec![PageImageStatus::Initial, PageImageStatus::Initial]
        );
        assert_eq!(project(&slots, PipelineState::Idle, 1), vec![PageImageStatus::Initial]);
    }

    #[test]
    fn test_every_page_gets_one_status() {
        let slot_sets = vec![
            vec![],
            vec![ImageSlot::new("p0")],
            vec![loaded("p0"), failed("p1"), ImageSlot::new("p2")],
        ];
        for slots in &slot_sets {
            for state in ALL_STATES {
                for page_count in 0..5 {
                    let statuses = project(slots, state, page_count);
                    assert_eq!(statuses.len(), page_count);
                    for (page, status) in statuses.iter().enumerate() {
                        if page >= slots.len() {
                            assert_eq!(*status, PageImageStatus::NoImageExpected);
                        }
                        if slots.get(page).is_some_and(|s| s.result.is_some()) {
                            assert_eq!(*status, PageImageStatus::Loaded);
                        }
                    }
                    // Same input, same output.
                    assert_eq!(statuses, project(slots, state, page_count));
                }
            }
        }
    }
}
