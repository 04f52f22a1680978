//! Input line parser.
//!
//! A line that starts with `/` is a command; `//` escapes a literal slash.
//! Everything else is chat text.

#[derive(Debug, PartialEq, Eq)]
pub enum ParsedInput {
    Chat(String),
    Command(ParsedCommand),
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParsedCommand {
    Exit,
    List,
    Help,
    Unknown(String),
}

pub const HELP_LINES: &[&str] = &[
    "/list   show who is online",
    "/exit   leave the chat",
    "/help   this list",
    "PgUp/PgDn or mouse wheel scroll, Ctrl+Home top, Ctrl+End bottom",
];

/// `None` for a blank line.
pub fn parse_input(input: &str) -> Option<ParsedInput> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Some(escaped) = input.strip_prefix("//") {
        return Some(ParsedInput::Chat(format!("/{escaped}")));
    }
    let Some(rest) = input.strip_prefix('/') else {
        return Some(ParsedInput::Chat(input.to_string()));
    };

    let cmd = rest.split_whitespace().next().unwrap_or_default().to_lowercase();
    let parsed = match cmd.as_str() {
        "exit" | "quit" => ParsedCommand::Exit,
        "list" | "who" => ParsedCommand::List,
        "help" => ParsedCommand::Help,
        _ => ParsedCommand::Unknown(cmd),
    };
    Some(ParsedInput::Command(parsed))
}
