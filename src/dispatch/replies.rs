//! User-facing reply texts.

use super::commands::COMMANDS;
use crate::sessions::{SessionError, SessionStats};

pub fn welcome() -> String {
    let mut lines = vec![
        "Welcome to the Markdown to PDF bot!".to_string(),
        String::new(),
        "Send your Markdown text, split across as many messages as you like.".to_string(),
        "Send /convert when you are done and you will get a PDF back.".to_string(),
        String::new(),
        "Example:".to_string(),
        "# Main Title".to_string(),
        "## Subtitle".to_string(),
        "This is **bold** and *italic* text.".to_string(),
        "- List item 1".to_string(),
        "- List item 2".to_string(),
        String::new(),
        "Commands:".to_string(),
    ];
    for (cmd, desc) in COMMANDS {
        lines.push(format!("  {cmd} - {desc}"));
    }
    lines.join("\n")
}

pub fn fragment_received(count: usize) -> String {
    format!("Fragment #{count} received.\n\nSend more Markdown or use /convert to create the PDF.")
}

pub fn nothing_to_convert() -> &'static str {
    "You have not sent any Markdown yet. Send some text first, then use /convert."
}

pub fn converting(fragments: usize) -> String {
    format!("Rendering {fragments} {}...", plural(fragments, "fragment"))
}

pub fn converted_caption(fragments: usize) -> String {
    format!("Converted {fragments} {}.", plural(fragments, "fragment"))
}

pub fn render_failed() -> &'static str {
    "Sorry, the PDF could not be rendered. Your fragments are kept; try /convert again or /cancel to start over."
}

pub fn delivery_failed() -> &'static str {
    "The PDF was rendered but could not be sent. Your fragments are kept; try /convert again."
}

pub fn status(stats: &SessionStats) -> String {
    format!(
        "Pending: {} {}\nTotal characters: {}\n\nPreview:\n{}",
        stats.fragments,
        plural(stats.fragments, "fragment"),
        stats.total_chars,
        stats.preview
    )
}

pub fn status_empty() -> &'static str {
    "Pending: 0 fragments. Send some Markdown to get started."
}

pub fn cancelled(discarded: usize) -> String {
    if discarded == 0 {
        "Nothing to cancel.".to_string()
    } else {
        format!(
            "Cancelled. {discarded} {} discarded.",
            plural(discarded, "fragment")
        )
    }
}

pub fn unknown_command(name: &str) -> String {
    format!("Unknown command /{name}. Send /help to see what I understand.")
}

pub fn rejected(err: &SessionError) -> String {
    match err {
        SessionError::EmptyFragment => "That message is empty, so it was not added.".to_string(),
        SessionError::LimitExceeded { .. } => {
            format!("Fragment not added: {err}. Use /convert or /cancel first.")
        }
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}
