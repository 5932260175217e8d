//! Syntax highlighting for fenced code blocks.

use std::sync::OnceLock;
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// Every emitted class carries this prefix so it cannot clash with the
/// document stylesheet.
const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

/// Light theme that prints well on white paper.
const THEME: &str = "InspiredGitHub";

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAXES: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

/// Whether `lang` can be placed in a class attribute as-is.
fn is_plain_token(lang: &str) -> bool {
    !lang.is_empty()
        && lang
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '#' | '.'))
}

/// Highlight `code` as `lang`, returning classed `<span>` markup with the
/// code text escaped. `None` when the language is not recognised.
pub fn highlight(lang: &str, code: &str) -> Option<String> {
    if !is_plain_token(lang) {
        return None;
    }
    let syntaxes = syntax_set();
    let syntax = syntaxes.find_syntax_by_token(lang)?;

    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, syntaxes, CLASS_STYLE);
    for line in LinesWithEndings::from(code) {
        if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
            tracing::debug!(lang, "highlighting failed, falling back to plain code: {e}");
            return None;
        }
    }
    Some(generator.finalize())
}

/// CSS for the classes produced by [`highlight`].
pub fn stylesheet() -> &'static str {
    static CSS: OnceLock<String> = OnceLock::new();
    CSS.get_or_init(|| {
        let themes = ThemeSet::load_defaults();
        let Some(theme) = themes.themes.get(THEME) else {
            tracing::warn!("highlight theme {THEME} is missing");
            return String::new();
        };
        css_for_theme_with_class_style(theme, CLASS_STYLE).unwrap_or_else(|e| {
            tracing::warn!("failed to build highlight stylesheet: {e}");
            String::new()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_is_highlighted_with_prefixed_classes() {
        let html = highlight("python", "def greet(name):\n    return 'hi ' + name\n").unwrap();
        assert!(html.contains("<span class=\"hl-"));
        assert!(html.contains("greet"));
    }

    #[test]
    fn code_text_is_escaped() {
        let html = highlight("rust", "let x = a < b && c > d;\n").unwrap();
        assert!(html.contains("&lt;"));
        assert!(html.contains("&amp;&amp;"));
        assert!(!html.contains("a < b"));
    }

    #[test]
    fn unknown_or_unsafe_language_is_declined() {
        assert!(highlight("nosuchlanguage", "x\n").is_none());
        assert!(highlight("py\"onclick", "x\n").is_none());
        assert!(highlight("", "x\n").is_none());
    }

    #[test]
    fn stylesheet_targets_prefixed_classes() {
        let css = stylesheet();
        assert!(!css.is_empty());
        assert!(css.contains(".hl-"));
    }
}
