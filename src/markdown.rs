//! Markdown to HTML rendering for policy and training content.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

/// Render markdown to HTML.
///
/// Tables, strikethrough, task lists and footnotes are enabled. Raw HTML in
/// the source is emitted as escaped text.
pub fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: neutralize_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: neutralize_url(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Replace script-capable URL schemes with an inert fragment.
fn neutralize_url(url: CowStr<'_>) -> CowStr<'_> {
    let scheme = url.trim_start().to_ascii_lowercase();
    if ["javascript:", "vbscript:", "data:"]
        .iter()
        .any(|prefix| scheme.starts_with(prefix))
    {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_headings_and_emphasis() {
        let html = render_markdown("# Privacy Policy\n\nKeep PHI **secure**.");
        assert!(html.contains("<h1>Privacy Policy</h1>"));
        assert!(html.contains("<strong>secure</strong>"));
    }

    #[test]
    fn test_renders_tables_and_strikethrough() {
        let md = "| Role | Access |\n|---|---|\n| Nurse | Chart |\n\n~~old rule~~";
        let html = render_markdown(md);
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>Nurse</td>"));
        assert!(html.contains("<del>old rule</del>"));
    }

    #[test]
    fn test_escapes_raw_html() {
        let html = render_markdown("Hello <script>alert(1)</script>\n\n<div onclick=\"x\">hi</div>");
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<div onclick"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_neutralizes_javascript_links() {
        let html = render_markdown("[click](javascript:alert(1)) [ok](https://hhs.gov)");
        assert!(!html.contains("javascript:"));
        assert!(html.contains("href=\"https://hhs.gov\""));
    }
}
