/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Convert,
    Status,
    Cancel,
    /// A slash command the bot does not know (lowercased, without `/`).
    Unknown(String),
    /// Anything that is not a command: a Markdown fragment.
    Text(String),
    /// A command addressed to a different bot (`/convert@other_bot`).
    ForOtherBot,
}

/// Commands shown in the help text, in display order.
pub const COMMANDS: &[(&str, &str)] = &[
    ("/start", "Show the welcome message"),
    ("/help", "Show available commands"),
    ("/convert", "Render pending fragments to PDF"),
    ("/status", "Show pending fragments"),
    ("/cancel", "Discard pending fragments"),
];

impl Command {
    /// Parse message text.
    ///
    /// The first whitespace-delimited token is a command when it is `/`
    /// followed by `[A-Za-z0-9_]+`, optionally suffixed with `@botname`.
    /// Matching is case-insensitive and trailing arguments are ignored.
    /// Everything else (including Markdown such as `/usr/bin` paths) is text.
    pub fn parse(text: &str) -> Self {
        Self::parse_for(text, None)
    }

    /// Like [`Command::parse`], but when `bot_username` is known a command
    /// whose `@suffix` names another bot becomes [`Command::ForOtherBot`].
    pub fn parse_for(text: &str, bot_username: Option<&str>) -> Self {
        let trimmed = text.trim_start();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Self::Text(text.to_string());
        };

        let token = rest.split(char::is_whitespace).next().unwrap_or("");
        let (name, suffix) = match token.split_once('@') {
            Some((name, bot)) => (name, Some(bot)),
            None => (token, None),
        };

        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Self::Text(text.to_string());
        }

        if let (Some(suffix), Some(me)) = (suffix, bot_username) {
            let me = me.trim_start_matches('@');
            if !suffix.eq_ignore_ascii_case(me) {
                return Self::ForOtherBot;
            }
        }

        match name.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "convert" => Self::Convert,
            "status" => Self::Status,
            "cancel" => Self::Cancel,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Convert => "convert",
            Self::Status => "status",
            Self::Cancel => "cancel",
            Self::Unknown(_) => "unknown",
            Self::Text(_) => "text",
            Self::ForOtherBot => "other_bot",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse("/start"), Command::Start);
        assert_eq!(Command::parse("/help"), Command::Help);
        assert_eq!(Command::parse("/convert"), Command::Convert);
        assert_eq!(Command::parse("/status"), Command::Status);
        assert_eq!(Command::parse("/cancel"), Command::Cancel);
    }

    #[test]
    fn strips_bot_suffix_and_ignores_case() {
        assert_eq!(Command::parse("/convert@mdpdf_bot"), Command::Convert);
        assert_eq!(Command::parse("/STATUS"), Command::Status);
        assert_eq!(Command::parse("  /Cancel now please"), Command::Cancel);
    }

    #[test]
    fn suffix_must_match_own_username_when_known() {
        assert_eq!(
            Command::parse_for("/convert@MdPdf_Bot", Some("mdpdf_bot")),
            Command::Convert
        );
        assert_eq!(
            Command::parse_for("/convert@other_bot", Some("mdpdf_bot")),
            Command::ForOtherBot
        );
        assert_eq!(
            Command::parse_for("/convert", Some("mdpdf_bot")),
            Command::Convert
        );
        assert_eq!(
            Command::parse_for("/convert@other_bot", None),
            Command::Convert
        );
    }

    #[test]
    fn unknown_command_keeps_name() {
        assert_eq!(
            Command::parse("/Export pdf"),
            Command::Unknown("export".into())
        );
    }

    #[test]
    fn plain_markdown_is_text() {
        let text = "# Title\n\nSome **bold** text.";
        assert_eq!(Command::parse(text), Command::Text(text.into()));
    }

    #[test]
    fn paths_and_lone_slash_are_text() {
        assert_eq!(
            Command::parse("/usr/bin/env is a path"),
            Command::Text("/usr/bin/env is a path".into())
        );
        assert_eq!(Command::parse("/"), Command::Text("/".into()));
        assert_eq!(Command::parse("/ spaced"), Command::Text("/ spaced".into()));
    }

    #[test]
    fn command_list_covers_every_command() {
        for (cmd, desc) in COMMANDS {
            assert!(!matches!(
                Command::parse(cmd),
                Command::Unknown(_) | Command::Text(_) | Command::ForOtherBot
            ));
            assert!(!desc.is_empty());
        }
    }
}
