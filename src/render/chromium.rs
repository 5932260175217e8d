//! Headless Chromium HTML-to-PDF engine.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::template::PageLayout;
use super::traits::{HtmlToPdf, RenderError};

const MM_PER_INCH: f64 = 25.4;

/// Prints HTML through a fresh headless Chromium per document.
pub struct ChromiumPdfEngine {
    executable: Option<PathBuf>,
    no_sandbox: bool,
    layout: PageLayout,
}

impl ChromiumPdfEngine {
    pub fn new(layout: PageLayout) -> Self {
        Self {
            executable: None,
            no_sandbox: false,
            layout,
        }
    }

    /// Use a specific Chrome/Chromium binary instead of auto-detection.
    pub fn with_executable(mut self, path: Option<PathBuf>) -> Self {
        self.executable = path;
        self
    }

    /// Pass `--no-sandbox`; needed when running as root inside containers.
    pub fn with_no_sandbox(mut self, no_sandbox: bool) -> Self {
        self.no_sandbox = no_sandbox;
        self
    }

    /// Fresh profile directory for one browser; removed when dropped.
    fn profile_dir() -> Result<TempDir, RenderError> {
        tempfile::Builder::new()
            .prefix("mdpdf-chromium-")
            .tempdir()
            .map_err(|e| RenderError::Engine(format!("failed to create browser profile: {e}")))
    }

    fn browser_config(&self, profile: &Path) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder().user_data_dir(profile);
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        if self.no_sandbox {
            builder = builder.arg("--no-sandbox");
        }
        builder = builder.arg("--disable-gpu").arg("--disable-dev-shm-usage");
        builder.build().map_err(RenderError::Engine)
    }

    fn print_params(&self) -> PrintToPdfParams {
        let (width, height) = self.layout.format.size_inches();
        let margin = self.layout.margin_mm / MM_PER_INCH;
        PrintToPdfParams {
            print_background: Some(true),
            prefer_css_page_size: Some(true),
            paper_width: Some(width),
            paper_height: Some(height),
            margin_top: Some(margin),
            margin_bottom: Some(margin),
            margin_left: Some(margin),
            margin_right: Some(margin),
            ..PrintToPdfParams::default()
        }
    }
}

async fn print_page(
    page: &Page,
    html: &str,
    params: PrintToPdfParams,
) -> Result<Vec<u8>, RenderError> {
    page.set_content(html)
        .await
        .map_err(|e| RenderError::Engine(format!("loading document failed: {e}")))?;
    page.pdf(params)
        .await
        .map_err(|e| RenderError::Engine(format!("printing failed: {e}")))
}

#[async_trait]
impl HtmlToPdf for ChromiumPdfEngine {
    async fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        // Concurrent browsers must not share a profile; Chromium locks it.
        let profile = Self::profile_dir()?;
        let config = self.browser_config(profile.path())?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Engine(format!("failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler stopped: {e}");
                    break;
                }
            }
        });

        let result = match browser.new_page("about:blank").await {
            Ok(page) => print_page(&page, html, self.print_params()).await,
            Err(e) => Err(RenderError::Engine(format!("failed to open page: {e}"))),
        };

        if let Err(e) = browser.close().await {
            tracing::debug!("browser close failed: {e}");
        }
        if let Err(e) = browser.wait().await {
            tracing::debug!("browser process wait failed: {e}");
        }
        if let Err(e) = handler_task.await {
            tracing::debug!("browser handler task failed: {e}");
        }
        if let Err(e) = profile.close() {
            tracing::debug!("failed to remove browser profile: {e}");
        }

        if let Ok(bytes) = &result {
            tracing::debug!(bytes = bytes.len(), "chromium printed document");
        }
        result
    }

    fn name(&self) -> &str {
        "chromium"
    }
}
