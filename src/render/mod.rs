//! Document rendering: Markdown → HTML → PDF.

pub mod chromium;
pub mod highlight;
pub mod markdown;
pub mod template;
pub mod traits;

pub use chromium::ChromiumPdfEngine;
pub use markdown::{first_heading, CommonMarkConverter};
pub use template::{DocumentTemplate, PageLayout};
pub use traits::{HtmlToPdf, MarkdownToHtml, PageFormat, RenderError};

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RendererConfig;

/// Title used when the document has no heading.
pub const DEFAULT_TITLE: &str = "Markdown Document";

/// The full rendering pipeline.
///
/// HTML composition runs on the blocking pool and the whole pipeline is
/// bounded by `timeout`, so a pathological document cannot stall the
/// runtime or hold a browser forever.
pub struct DocumentRenderer {
    markdown: Arc<dyn MarkdownToHtml>,
    template: DocumentTemplate,
    engine: Arc<dyn HtmlToPdf>,
    timeout: Duration,
}

impl DocumentRenderer {
    pub fn new(
        markdown: Arc<dyn MarkdownToHtml>,
        template: DocumentTemplate,
        engine: Arc<dyn HtmlToPdf>,
        timeout: Duration,
    ) -> Self {
        Self {
            markdown,
            template,
            engine,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Build the styled HTML document for `markdown`.
    pub async fn render_html(&self, markdown: &str) -> Result<String, RenderError> {
        if markdown.trim().is_empty() {
            return Err(RenderError::EmptyDocument);
        }

        let converter = Arc::clone(&self.markdown);
        let template = self.template.clone();
        let source = markdown.to_string();

        tokio::task::spawn_blocking(move || {
            let title = first_heading(&source).unwrap_or_else(|| DEFAULT_TITLE.to_string());
            let body = converter.to_html(&source);
            template.render(&title, &body)
        })
        .await
        .map_err(|e| RenderError::Interrupted(e.to_string()))?
    }

    /// Render `markdown` to PDF bytes.
    pub async fn render(&self, markdown: &str) -> Result<Vec<u8>, RenderError> {
        let pipeline = async {
            let html = self.render_html(markdown).await?;
            tracing::debug!(html_bytes = html.len(), engine = self.engine.name(), "printing document");
            self.engine.html_to_pdf(&html).await
        };

        match tokio::time::timeout(self.timeout, pipeline).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

/// Build the production renderer from `[renderer]` settings.
pub fn create_renderer(config: &RendererConfig) -> Result<DocumentRenderer> {
    let layout = PageLayout {
        format: config.page_format,
        margin_mm: config.margin_mm,
    };
    let template = DocumentTemplate::new(layout).context("Failed to compile document template")?;

    let executable = config
        .chrome_executable
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()));

    let engine = ChromiumPdfEngine::new(layout)
        .with_executable(executable)
        .with_no_sandbox(config.chrome_no_sandbox);
    let converter = CommonMarkConverter::new().with_hard_breaks(config.hard_breaks);

    Ok(DocumentRenderer::new(
        Arc::new(converter),
        template,
        Arc::new(engine),
        Duration::from_secs(config.timeout_secs),
    ))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine that "prints" by returning the HTML bytes, counting calls.
    #[derive(Default)]
    pub struct EchoEngine {
        pub calls: AtomicUsize,
        pub delay: Option<Duration>,
        pub fail: bool,
    }

    impl EchoEngine {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HtmlToPdf for EchoEngine {
        async fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(RenderError::Engine("out of memory".into()));
            }
            Ok(html.as_bytes().to_vec())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    pub fn renderer_with(engine: Arc<EchoEngine>, timeout: Duration) -> DocumentRenderer {
        DocumentRenderer::new(
            Arc::new(CommonMarkConverter::new()),
            DocumentTemplate::new(PageLayout::default()).unwrap(),
            engine,
            timeout,
        )
    }
}
