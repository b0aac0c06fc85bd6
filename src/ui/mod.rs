use crate::services::pagination::{PageView, Storybook};
use crate::services::projector::PageImageStatus;
use anyhow::Result;
use inquire::Select;

const NEXT: &str = "Next";
const BACK: &str = "Back";
const QUIT: &str = "Quit";

pub fn render_page(title: &str, page: &PageView<'_>, image_path: Option<&str>) -> String {
    let picture = match page.status {
        PageImageStatus::Loaded => match image_path {
            Some(path) => format!("[Picture: {}]", path),
            None => "[Picture ready]".to_string(),
        },
        PageImageStatus::Loading => "[Drawing the magic...]".to_string(),
        PageImageStatus::Error => "[Couldn't draw this part!]".to_string(),
        PageImageStatus::Initial => "[Picture for this page is coming soon!]".to_string(),
        PageImageStatus::NoImageExpected => String::new(),
    };

    let mut out = format!("\n{}\n", title);
    if !picture.is_empty() {
        out.push_str(&format!("\n{}\n", picture));
    }
    out.push_str(&format!("\n{}\n\nPage {} / {}\n", page.text, page.number, page.total));
    out
}

fn choices(page: &PageView<'_>) -> Vec<&'static str> {
    let mut options = Vec::with_capacity(3);
    if page.can_go_forward {
        options.push(NEXT);
    }
    if page.can_go_back {
        options.push(BACK);
    }
    options.push(QUIT);
    options
}

/// Page-by-page reader. Back and Next are only offered where they lead somewhere.
pub fn read_storybook(book: &mut Storybook, title: &str, image_paths: &[Option<String>]) -> Result<()> {
    loop {
        let Some(page) = book.current() else {
            println!("This story has no pages.");
            return Ok(());
        };

        let path = image_paths.get(page.number - 1).and_then(|p| p.as_deref());
        println!("{}", render_page(title, &page, path));

        let options = choices(&page);
        match Select::new("Turn the page:", options).prompt()? {
            NEXT => book.next(),
            BACK => book.previous(),
            _ => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(status: PageImageStatus, number: usize, total: usize) -> PageView<'static> {
        PageView {
            number,
            total,
            text: "Mia met a friendly dragon.",
            status,
            image: None,
            can_go_back: number > 1,
            can_go_forward: number < total,
        }
    }

    #[test]
    fn test_render_each_status() {
        let loaded = render_page(
            "Mia's Magical Story!",
            &page(PageImageStatus::Loaded, 1, 3),
            Some("out/page_01.png"),
        );
        assert!(loaded.contains("[Picture: out/page_01.png]"));
        assert!(loaded.contains("Page 1 / 3"));

        let loading = render_page("t", &page(PageImageStatus::Loading, 1, 3), None);
        assert!(loading.contains("Drawing the magic"));

        let error = render_page("t", &page(PageImageStatus::Error, 1, 3), None);
        assert!(error.contains("Couldn't draw"));

        let none = render_page("t", &page(PageImageStatus::NoImageExpected, 3, 3), None);
        assert!(!none.contains('['));
        assert!(none.contains("Mia met a friendly dragon."));
    }

    #[test]
    fn test_choices_follow_boundaries() {
        assert_eq!(choices(&page(PageImageStatus::Loaded, 1, 3)), vec![NEXT, QUIT]);
        assert_eq!(choices(&page(PageImageStatus::Loaded, 2, 3)), vec![NEXT, BACK, QUIT]);
        assert_eq!(choices(&page(PageImageStatus::Loaded, 3, 3)), vec![BACK, QUIT]);
        assert_eq!(choices(&page(PageImageStatus::Loaded, 1, 1)), vec![QUIT]);
    }
}
