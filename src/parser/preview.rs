//! File preview pages (`_profiler/open?file=...`).

use scraper::{Html, Selector};

/// Marker the profiler renders when the requested file can't be shown.
pub const NOT_FOUND_MARKER: &str = "<h2>Token not found</h2>";

/// Rebuilds file contents from the profiler's source preview.
#[derive(Clone)]
pub struct PreviewParser {
    code: Selector,
}

impl PreviewParser {
    pub fn new() -> Self {
        Self {
            // Each source line sits in its own <code> element.
            code: Selector::parse("code").unwrap(),
        }
    }

    /// True when a preview response actually carries a file.
    pub fn is_preview(&self, status: u16, body: &str) -> bool {
        status == 200 && !body.contains(NOT_FOUND_MARKER)
    }

    /// Raw file content. Binary files don't survive the round trip.
    pub fn parse(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let lines: Vec<String> = document
            .select(&self.code)
            .map(|line| line.text().collect::<String>().replace('\u{a0}', " "))
            .collect();
        lines.join("\n")
    }
}

impl Default for PreviewParser {
    fn default() -> Self {
        Self::new()
    }
}
