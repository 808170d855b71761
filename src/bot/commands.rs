use crate::bot::attachments::MediaKind;
use anyhow::Result;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(Option<String>),
    Chat(Option<String>),
    Describe,
    Summarize,
    SummarizeAudio,
    DescribeVideo,
    Labels,
    Help,
}

/// Name and help text for every command, in help order.
pub const COMMANDS: &[(&str, &str)] = &[
    ("ask", "Ask a question to the AI."),
    ("describe", "Upload an image and have it described by the AI."),
    ("summarize", "Upload a PDF and have it summarized by the AI."),
    ("chat", "Start a chat session with the AI."),
    ("summarize_audio", "Upload an audio file and have it summarized by the AI."),
    ("describe_video", "Upload a video file and have it described by the AI."),
    ("labels", "Upload an image and list what Cloud Vision detects in it."),
    ("help", "Show this help message."),
];

impl Command {
    fn from_parts(name: &str, rest: Option<String>) -> Option<Self> {
        let command = match name {
            "ask" => Self::Ask(rest),
            "chat" => Self::Chat(rest),
            "describe" => Self::Describe,
            "summarize" => Self::Summarize,
            "summarize_audio" => Self::SummarizeAudio,
            "describe_video" => Self::DescribeVideo,
            "labels" => Self::Labels,
            "help" => Self::Help,
            _ => return None,
        };
        Some(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ask(_) => "ask",
            Self::Chat(_) => "chat",
            Self::Describe => "describe",
            Self::Summarize => "summarize",
            Self::SummarizeAudio => "summarize_audio",
            Self::DescribeVideo => "describe_video",
            Self::Labels => "labels",
            Self::Help => "help",
        }
    }

    /// The kind of upload this command works on, if any.
    pub fn media(&self) -> Option<MediaKind> {
        match self {
            Self::Describe | Self::Labels => Some(MediaKind::Image),
            Self::Summarize => Some(MediaKind::Pdf),
            Self::SummarizeAudio => Some(MediaKind::Audio),
            Self::DescribeVideo => Some(MediaKind::Video),
            Self::Ask(_) | Self::Chat(_) | Self::Help => None,
        }
    }
}

pub struct CommandParser {
    pattern: Regex,
}

impl CommandParser {
    pub fn new(prefix: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"(?s)^{}(\w+)(?:\s+(.*))?$", regex::escape(prefix)))?;
        Ok(Self { pattern })
    }

    /// `None` for plain chatter and for unknown command names.
    pub fn parse(&self, content: &str) -> Option<Command> {
        let caps = self.pattern.captures(content.trim())?;
        let name = caps.get(1)?.as_str().to_lowercase();
        let rest = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty());
        Command::from_parts(&name, rest)
    }
}

pub fn help_text(prefix: &str) -> String {
    let mut text = String::from("**Bot Commands**\n");
    for (name, description) in COMMANDS {
        text.push_str(&format!("`{prefix}{name}` - {description}\n"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands_with_arguments() {
        let parser = CommandParser::new("/").unwrap();
        assert_eq!(
            parser.parse("/ask What is Rust?"),
            Some(Command::Ask(Some("What is Rust?".into())))
        );
        assert_eq!(
            parser.parse("  /chat hello\nsecond line  "),
            Some(Command::Chat(Some("hello\nsecond line".into())))
        );
        assert_eq!(parser.parse("/ask"), Some(Command::Ask(None)));
        assert_eq!(parser.parse("/ask    "), Some(Command::Ask(None)));
    }

    #[test]
    fn test_parse_attachment_commands() {
        let parser = CommandParser::new("/").unwrap();
        assert_eq!(parser.parse("/describe"), Some(Command::Describe));
        assert_eq!(parser.parse("/summarize_audio"), Some(Command::SummarizeAudio));
        assert_eq!(parser.parse("/DESCRIBE_VIDEO"), Some(Command::DescribeVideo));
        assert_eq!(Command::Summarize.media(), Some(MediaKind::Pdf));
        assert_eq!(Command::Ask(None).media(), None);
    }

    #[test]
    fn test_parse_ignores_chatter_and_unknown_commands() {
        let parser = CommandParser::new("/").unwrap();
        assert_eq!(parser.parse("hello there"), None);
        assert_eq!(parser.parse("/unknown thing"), None);
        assert_eq!(parser.parse("ask /ask"), None);
    }

    #[test]
    fn test_custom_prefix_is_escaped() {
        let parser = CommandParser::new("!").unwrap();
        assert_eq!(parser.parse("!help"), Some(Command::Help));
        assert_eq!(parser.parse("/help"), None);

        let parser = CommandParser::new(".").unwrap();
        assert_eq!(parser.parse("xhelp"), None);
    }

    #[test]
    fn test_every_listed_command_parses_to_itself() {
        let parser = CommandParser::new("/").unwrap();
        for (name, _) in COMMANDS {
            let command = parser.parse(&format!("/{name}")).unwrap();
            assert_eq!(command.name(), *name);
        }
        assert!(help_text("/").contains("`/describe_video` - Upload a video file"));
    }
}
