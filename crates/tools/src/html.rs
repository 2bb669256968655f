//! HTML helpers shared by `search` and `fetch_url`.
//!
//! Documents are parsed with `scraper` (html5ever underneath), so entities
//! are decoded and attribute values never leak into text. Page bodies are
//! rendered to readable text with `htmd`.

use htmd::HtmlToMarkdown;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));

/// Text content of an element with whitespace collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    let text: String = element.text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce a page to its visible text: head, scripts, styles and
/// `<noscript>` blocks removed, one non-blank line per text run.
pub fn page_text(html: &str) -> String {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["head", "script", "style", "noscript", "template"])
        .build();
    let text = match converter.convert(html) {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, "HTML conversion failed, falling back to raw text");
            Html::parse_document(html).root_element().text().collect()
        }
    };
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Contents of the first `<title>` element, if non-empty.
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title = document.select(&TITLE).next().map(element_text)?;
    (!title.is_empty()).then_some(title)
}

/// Truncate to at most `max_chars` characters.
pub fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}
