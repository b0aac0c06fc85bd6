use crate::core::state::PipelineSnapshot;
use crate::services::projector::{project, PageImageStatus};
use crate::utils::data_uri::DataUri;

/// Current page of a book whose length may change underneath it.
///
/// Navigating past either end is a no-op.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaginationController {
    current_page: usize,
    page_count: usize,
}

impl PaginationController {
    pub fn new(page_count: usize) -> Self {
        Self {
            current_page: 0,
            page_count,
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn next(&mut self) {
        if self.current_page + 1 < self.page_count {
            self.current_page += 1;
        }
    }

    pub fn previous(&mut self) {
        self.current_page = self.current_page.saturating_sub(1);
    }

    pub fn on_page_count_changed(&mut self, page_count: usize) {
        self.page_count = page_count;
        if page_count == 0 {
            self.current_page = 0;
        } else if self.current_page >= page_count {
            self.current_page = page_count - 1;
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.current_page > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.current_page + 1 < self.page_count
    }
}

/// Splits story text into pages: one per non-blank line.
pub fn split_pages(story_text: &str) -> Vec<String> {
    story_text
        .lines()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, PartialEq)]
pub struct PageView<'a> {
    /// One-based, for display.
    pub number: usize,
    pub total: usize,
    pub text: &'a str,
    pub status: PageImageStatus,
    pub image: Option<&'a DataUri>,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

/// Paginated view over the latest pipeline snapshot.
#[derive(Debug, Default)]
pub struct Storybook {
    story_text: String,
    pages: Vec<String>,
    images: Vec<Option<DataUri>>,
    statuses: Vec<PageImageStatus>,
    pagination: PaginationController,
}

impl Storybook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &PipelineSnapshot) -> Self {
        let mut book = Self::new();
        book.refresh(snapshot);
        book
    }

    pub fn set_story_text(&mut self, story_text: &str) {
        if story_text == self.story_text {
            return;
        }
        self.story_text = story_text.to_string();
        self.pages = split_pages(story_text);
        self.pagination.on_page_count_changed(self.pages.len());
    }

    /// Applies a snapshot. Returns whether the page statuses changed.
    pub fn refresh(&mut self, snapshot: &PipelineSnapshot) -> bool {
        let text = snapshot.story.as_ref().map(|s| s.story_text.as_str()).unwrap_or("");
        self.set_story_text(text);

        self.images = snapshot.slots.iter().map(|s| s.result.clone()).collect();
        let statuses = project(&snapshot.slots, snapshot.state, self.pages.len());
        if statuses == self.statuses {
            return false;
        }
        self.statuses = statuses;
        true
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn statuses(&self) -> &[PageImageStatus] {
        &self.statuses
    }

    pub fn next(&mut self) {
        self.pagination.next();
    }

    pub fn previous(&mut self) {
        self.pagination.previous();
    }

    pub fn current(&self) -> Option<PageView<'_>> {
        let index = self.pagination.current_page();
        let text = self.pages.get(index)?;
        let status = self
            .statuses
            .get(index)
            .copied()
            .unwrap_or(PageImageStatus::Initial);
        Some(PageView {
            number: index + 1,
            total: self.pages.len(),
            text,
            status,
            image: self.images.get(index).and_then(Option::as_ref),
            can_go_back: self.pagination.can_go_back(),
            can_go_forward: self.pagination.can_go_forward(),
        })
    }
}
