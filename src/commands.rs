use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Snapshot the instruction block from the current form fields
    Init,
    /// Clear the chat transcript (form fields are kept)
    Reset,
    /// Open the configuration form
    Form,
    /// Switch model by label
    Model,
    /// Show help
    Help,
    /// Exit the application
    Quit,
}

impl SlashCommand {
    /// Command string without the leading '/'.
    pub fn keyword(self) -> &'static str {
        self.into()
    }

    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Init => "snapshot the instruction block from the current form fields",
            SlashCommand::Reset => "clear the chat transcript (form fields are kept)",
            SlashCommand::Form => "open the configuration form",
            SlashCommand::Model => "switch model by label, e.g. /model OpenAI 4o-mini",
            SlashCommand::Help => "show available commands",
            SlashCommand::Quit => "exit the application",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }
}

/// Parse a slash command from composer input.
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].split_whitespace();
    let head = parts.next()?;
    let rest: Vec<&str> = parts.collect();

    let command = SlashCommand::from_str(head)
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "i" | "initialize" => Some(SlashCommand::Init),
            "r" | "clear" => Some(SlashCommand::Reset),
            "f" | "config" => Some(SlashCommand::Form),
            "m" | "models" => Some(SlashCommand::Model),
            "h" => Some(SlashCommand::Help),
            "q" | "exit" | "bye" => Some(SlashCommand::Quit),
            _ => None,
        })?;

    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Help text for all available commands.
pub fn help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for command in SlashCommand::iter() {
        help.push_str(&format!(
            "/{} - {}\n",
            command.keyword(),
            command.description()
        ));
    }
    help.push_str("\nAliases: /i /r /f /m /h /q, plus /clear, /models, /exit");
    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_command() {
        let parsed = parse_slash_command("/reset").unwrap();
        assert_eq!(parsed.command, SlashCommand::Reset);
        assert!(parsed.argument.is_none());
    }

    #[test]
    fn parses_command_with_argument() {
        let parsed = parse_slash_command("/model OpenAI 4o-mini").unwrap();
        assert_eq!(parsed.command, SlashCommand::Model);
        assert_eq!(parsed.argument(), Some("OpenAI 4o-mini"));
    }

    #[test]
    fn parses_aliases() {
        assert_eq!(
            parse_slash_command("/q").unwrap().command,
            SlashCommand::Quit
        );
        assert_eq!(
            parse_slash_command("/clear").unwrap().command,
            SlashCommand::Reset
        );
        assert_eq!(
            parse_slash_command("/models").unwrap().command,
            SlashCommand::Model
        );
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert!(parse_slash_command("hello there").is_none());
        assert!(parse_slash_command("/definitely-not-a-command").is_none());
    }
}
