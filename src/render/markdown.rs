//! CommonMark (+ GFM tables) to HTML conversion.

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

use super::highlight;
use super::traits::MarkdownToHtml;

/// `pulldown-cmark` backed converter.
///
/// Fenced code blocks in a recognised language are syntax highlighted; the
/// rest are printed as plain `<pre><code>`.
///
/// Raw HTML in the input is escaped and printed as text: the output is fed
/// to a browser, so user messages must not be able to inject markup or
/// scripts into the document.
pub struct CommonMarkConverter {
    hard_breaks: bool,
}

impl CommonMarkConverter {
    pub fn new() -> Self {
        Self { hard_breaks: true }
    }

    /// When enabled, single newlines inside a paragraph become `<br />`,
    /// matching how chat users expect their line breaks to look.
    pub fn with_hard_breaks(mut self, enabled: bool) -> Self {
        self.hard_breaks = enabled;
        self
    }

    fn options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
    }
}

impl Default for CommonMarkConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownToHtml for CommonMarkConverter {
    fn to_html(&self, markdown: &str) -> String {
        let mut events = Vec::new();
        let mut fence: Option<(CowStr<'_>, String)> = None;

        for event in Parser::new_ext(markdown, Self::options()) {
            if fence.is_some() {
                match event {
                    Event::Text(text) => {
                        if let Some((_, code)) = fence.as_mut() {
                            code.push_str(&text);
                        }
                        continue;
                    }
                    Event::End(TagEnd::CodeBlock) => {
                        if let Some((info, code)) = fence.take() {
                            push_fenced_block(&mut events, info, code);
                        }
                        continue;
                    }
                    _ => {}
                }
            }

            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    fence = Some((info, String::new()));
                }
                Event::SoftBreak if self.hard_breaks => events.push(Event::HardBreak),
                Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
                other => events.push(other),
            }
        }
        if let Some((info, code)) = fence.take() {
            push_fenced_block(&mut events, info, code);
        }

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }

    fn name(&self) -> &str {
        "pulldown-cmark"
    }
}

/// Emit one fenced block, highlighted when its language is known.
fn push_fenced_block<'a>(events: &mut Vec<Event<'a>>, info: CowStr<'a>, code: String) {
    let lang = info.split_whitespace().next().unwrap_or("");
    if let Some(spans) = highlight::highlight(lang, &code) {
        let block = format!(
            "<pre class=\"highlight\"><code class=\"language-{lang}\">{spans}</code></pre>\n"
        );
        events.push(Event::Html(block.into()));
        return;
    }

    events.push(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))));
    if !code.is_empty() {
        events.push(Event::Text(code.into()));
    }
    events.push(Event::End(TagEnd::CodeBlock));
}

/// Plain-text title for the document: the first heading, if any.
pub fn first_heading(markdown: &str) -> Option<String> {
    let mut in_heading = false;
    let mut title = String::new();

    for event in Parser::new_ext(markdown, CommonMarkConverter::options()) {
        match event {
            Event::Start(Tag::Heading { .. }) => in_heading = true,
            Event::End(TagEnd::Heading(_)) => {
                let trimmed = title.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
                in_heading = false;
            }
            Event::Text(t) | Event::Code(t) if in_heading => title.push_str(&t),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn convert(md: &str) -> String {
        CommonMarkConverter::new().to_html(md)
    }

    fn texts(html: &str, selector: &str) -> Vec<String> {
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse(selector).unwrap();
        doc.select(&sel)
            .map(|e| e.text().collect::<String>().trim().to_string())
            .collect()
    }

    #[test]
    fn title_and_bold_scenario() {
        let html = convert("# Title\n\nSome **bold** text.");
        assert_eq!(texts(&html, "h1"), vec!["Title"]);
        assert_eq!(texts(&html, "p strong"), vec!["bold"]);
    }

    #[test]
    fn all_heading_levels() {
        let md = "# a\n## b\n### c\n#### d\n##### e\n###### f";
        let html = convert(md);
        for (tag, text) in [("h1", "a"), ("h2", "b"), ("h3", "c"), ("h4", "d"), ("h5", "e"), ("h6", "f")] {
            assert_eq!(texts(&html, tag), vec![text], "missing {tag}");
        }
    }

    #[test]
    fn table_keeps_header_and_cells() {
        let md = "| Produk | Unit Terjual | Revenue |\n|---|---|---|\n| Kopi | 120 | 3.600.000 |";
        let html = convert(md);

        assert_eq!(texts(&html, "table thead th"), vec!["Produk", "Unit Terjual", "Revenue"]);
        assert_eq!(texts(&html, "table tbody td"), vec!["Kopi", "120", "3.600.000"]);
    }

    #[test]
    fn nested_lists_and_blockquote() {
        let md = "- one\n  1. inner\n  2. inner two\n- two\n\n> quoted *text*";
        let html = convert(md);
        assert_eq!(texts(&html, "ul > li > ol > li").len(), 2);
        assert_eq!(texts(&html, "blockquote em"), vec!["text"]);
    }

    #[test]
    fn fenced_code_carries_language_class() {
        let html = convert("```python\nprint('hi')\n```");
        let doc = Html::parse_fragment(&html);
        let sel = Selector::parse("pre > code.language-python").unwrap();
        assert_eq!(doc.select(&sel).count(), 1);
        assert!(texts(&html, "pre code")[0].contains("print('hi')"));
    }

    #[test]
    fn inline_code_and_emphasis() {
        let html = convert("use `cargo` and *care*");
        assert_eq!(texts(&html, "code"), vec!["cargo"]);
        assert_eq!(texts(&html, "em"), vec!["care"]);
    }

    #[test]
    fn unterminated_fence_degrades_to_code_block() {
        let html = convert("```rust\nfn main() {\n");
        assert!(texts(&html, "pre code")[0].contains("fn main() {"));
    }

    #[test]
    fn python_fence_is_highlighted() {
        let html = convert("```python\nimport os\nprint(os.getcwd())\n```");
        let doc = Html::parse_fragment(&html);
        let spans = Selector::parse("pre.highlight > code.language-python span").unwrap();
        assert!(doc.select(&spans).count() > 0);
        assert!(texts(&html, "pre code")[0].contains("print(os.getcwd())"));
    }

    #[test]
    fn unknown_language_falls_back_to_plain_block() {
        let html = convert("```nosuchlang\n<b>x</b>\n```");
        let doc = Html::parse_fragment(&html);
        let code = Selector::parse("pre > code.language-nosuchlang").unwrap();
        let spans = Selector::parse("pre span").unwrap();
        assert_eq!(doc.select(&code).count(), 1);
        assert_eq!(doc.select(&spans).count(), 0);
        assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"));
    }

    #[test]
    fn untagged_fence_is_plain() {
        let html = convert("```\nplain text\n```");
        assert!(html.contains("<pre><code>plain text\n</code></pre>"));
    }

    #[test]
    fn unbalanced_emphasis_stays_literal() {
        let html = convert("this **is not closed");
        assert!(html.contains("**is not closed"));
    }

    #[test]
    fn raw_html_is_escaped() {
        let html = convert("<script>alert(1)</script>\n\nhi <b>x</b>");
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn soft_breaks_become_line_breaks() {
        let html = convert("line one\nline two");
        assert!(html.contains("<br />"));

        let html = CommonMarkConverter::new()
            .with_hard_breaks(false)
            .to_html("line one\nline two");
        assert!(!html.contains("<br />"));
    }

    #[test]
    fn first_heading_is_found() {
        assert_eq!(
            first_heading("intro\n\n## Laporan `Q1`\n\n# Later").as_deref(),
            Some("Laporan Q1")
        );
        assert_eq!(first_heading("no heading here"), None);
    }
}
