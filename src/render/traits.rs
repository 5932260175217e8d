use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to render: document is empty")]
    EmptyDocument,

    #[error("document template failed: {0}")]
    Template(String),

    #[error("PDF engine failed: {0}")]
    Engine(String),

    #[error("rendering timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("render worker stopped: {0}")]
    Interrupted(String),
}

impl From<tera::Error> for RenderError {
    fn from(e: tera::Error) -> Self {
        // tera keeps the useful detail in the source chain
        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        RenderError::Template(message)
    }
}

/// Converts Markdown text into an HTML fragment.
///
/// Implementations must never fail: constructs they cannot interpret are
/// emitted as literal text.
pub trait MarkdownToHtml: Send + Sync {
    fn to_html(&self, markdown: &str) -> String;
    fn name(&self) -> &str;
}

/// Prints a complete HTML document to PDF bytes.
#[async_trait]
pub trait HtmlToPdf: Send + Sync {
    async fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError>;
    fn name(&self) -> &str;
}

/// Paper sizes offered by the document template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PageFormat {
    #[default]
    A4,
    Letter,
    Legal,
}

impl PageFormat {
    /// Name used in the CSS `@page { size: ... }` rule.
    pub fn css_name(self) -> &'static str {
        match self {
            Self::A4 => "A4",
            Self::Letter => "letter",
            Self::Legal => "legal",
        }
    }

    /// Paper width and height in inches.
    pub fn size_inches(self) -> (f64, f64) {
        match self {
            Self::A4 => (8.27, 11.69),
            Self::Letter => (8.5, 11.0),
            Self::Legal => (8.5, 14.0),
        }
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::A4 => "A4",
            Self::Letter => "Letter",
            Self::Legal => "Legal",
        };
        f.write_str(name)
    }
}

impl FromStr for PageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(Self::A4),
            "letter" => Ok(Self::Letter),
            "legal" => Ok(Self::Legal),
            other => Err(format!("unknown page format '{other}' (expected A4, Letter or Legal)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_format_parses_case_insensitively() {
        assert_eq!("a4".parse::<PageFormat>().unwrap(), PageFormat::A4);
        assert_eq!(" LETTER ".parse::<PageFormat>().unwrap(), PageFormat::Letter);
        assert!("tabloid".parse::<PageFormat>().is_err());
    }

    #[test]
    fn page_format_serializes_as_variant_name() {
        let toml = toml::to_string(&Wrapper { f: PageFormat::Legal }).unwrap();
        assert!(toml.contains("\"Legal\""));
    }

    #[derive(Serialize)]
    struct Wrapper {
        f: PageFormat,
    }

    #[test]
    fn render_error_messages_are_readable() {
        let e = RenderError::Timeout { secs: 60 };
        assert_eq!(e.to_string(), "rendering timed out after 60s");
    }
}
