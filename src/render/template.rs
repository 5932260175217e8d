//! Fixed HTML document template and stylesheet applied to every render.

use std::sync::Arc;
use tera::{Context, Tera};

use super::highlight;
use super::traits::{PageFormat, RenderError};

const TEMPLATE_NAME: &str = "document.html";

const DOCUMENT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>{{ title }}</title>
<style>
@page { size: {{ page_size }}; margin: {{ margin_mm }}mm; }
body {
    font-family: 'Segoe UI', 'DejaVu Sans', Tahoma, Geneva, Verdana, sans-serif;
    font-size: 11pt;
    line-height: 1.6;
    color: #333;
    margin: 0;
}
h1, h2, h3, h4, h5, h6 {
    color: #2c3e50;
    margin-top: 24px;
    margin-bottom: 16px;
    page-break-after: avoid;
}
h1 { font-size: 2em; border-bottom: 2px solid #eee; padding-bottom: 10px; }
h2 { font-size: 1.5em; border-bottom: 1px solid #eee; padding-bottom: 8px; }
h3 { font-size: 1.25em; }
h4 { font-size: 1.1em; }
h5 { font-size: 1em; }
h6 { font-size: 0.9em; color: #666; }
code {
    background-color: #f4f4f4;
    padding: 2px 6px;
    border-radius: 3px;
    font-family: 'Consolas', 'Monaco', 'DejaVu Sans Mono', 'Courier New', monospace;
    font-size: 0.9em;
    color: #c7254e;
}
pre {
    background-color: #f8f8f8;
    padding: 16px;
    font-family: 'Consolas', 'Monaco', 'DejaVu Sans Mono', 'Courier New', monospace;
    font-size: 0.9em;
    line-height: 1.5;
    white-space: pre-wrap;
    word-wrap: break-word;
    page-break-inside: auto;
    margin: 16px 0;
}
pre code {
    background-color: transparent;
    padding: 0;
    color: inherit;
    border-radius: 0;
}
blockquote {
    border-left: 4px solid #ddd;
    padding-left: 16px;
    color: #666;
    margin: 16px 0;
    page-break-inside: avoid;
}
ul, ol { padding-left: 30px; }
li { margin: 8px 0; }
a { color: #3498db; text-decoration: none; }
table {
    border-collapse: collapse;
    width: 100%;
    margin: 16px 0;
    page-break-inside: avoid;
}
th, td {
    border: 1px solid #ddd;
    padding: 12px;
    text-align: left;
}
th { background-color: #f4f4f4; font-weight: bold; }
tbody tr:nth-child(even) { background-color: #fafafa; }
img { max-width: 100%; height: auto; }
p { page-break-inside: avoid; }
pre.highlight { background-color: #fafafa; border: 1px solid #eee; }
{{ highlight_css | safe }}
</style>
</head>
<body>
{{ content | safe }}
</body>
</html>
"#;

/// Page layout settings fed into the template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub format: PageFormat,
    pub margin_mm: f64,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            format: PageFormat::A4,
            margin_mm: 20.0,
        }
    }
}

/// Wraps an HTML fragment into a complete, styled document.
#[derive(Clone)]
pub struct DocumentTemplate {
    tera: Arc<Tera>,
    layout: PageLayout,
}

impl DocumentTemplate {
    pub fn new(layout: PageLayout) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, DOCUMENT_TEMPLATE)?;
        Ok(Self {
            tera: Arc::new(tera),
            layout,
        })
    }

    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    /// Render the full document. `title` is escaped; `body_html` is inserted
    /// verbatim and must already be safe HTML.
    pub fn render(&self, title: &str, body_html: &str) -> Result<String, RenderError> {
        let mut context = Context::new();
        context.insert("title", title);
        context.insert("page_size", self.layout.format.css_name());
        context.insert("margin_mm", &self.layout.margin_mm);
        context.insert("highlight_css", highlight::stylesheet());
        context.insert("content", body_html);

        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}
