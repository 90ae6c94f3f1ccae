/// A line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text: a message for the current conversation
    Say(String),
    Users,
    Dm(String),
    Close,
    Refresh,
    Help,
    Quit,
    Unknown(String),
}

pub const HELP: &str = "\
Commands:
  /users                 list registered members
  /dm <address|username> open a private conversation
  /close                 leave the private conversation
  /refresh               fetch the latest messages now
  /quit                  exit
Anything else is sent as a message.";

impl Command {
    /// Parse one input line; `None` for a blank line
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        // "//text" escapes a leading slash
        if let Some(escaped) = trimmed.strip_prefix("//") {
            return Some(Command::Say(format!("/{}", escaped)));
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Some(Command::Say(line.trim_end_matches(['\r', '\n']).to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "users" | "members" => Command::Users,
            "dm" | "pm" if !arg.is_empty() => Command::Dm(arg.to_string()),
            "close" | "back" => Command::Close,
            "refresh" => Command::Refresh,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(trimmed.to_string()),
        };
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("   "), None);
        assert_eq!(Command::parse("/users"), Some(Command::Users));
        assert_eq!(Command::parse("/DM  alice "), Some(Command::Dm("alice".to_string())));
        assert_eq!(Command::parse("/close"), Some(Command::Close));
        assert_eq!(Command::parse("/refresh"), Some(Command::Refresh));
        assert_eq!(Command::parse("/quit"), Some(Command::Quit));
    }

    #[test]
    fn test_dm_requires_target() {
        assert_eq!(Command::parse("/dm"), Some(Command::Unknown("/dm".to_string())));
    }

    #[test]
    fn test_plain_text_is_said() {
        assert_eq!(Command::parse("  gm all\n"), Some(Command::Say("  gm all".to_string())));
        assert_eq!(Command::parse("//shrug"), Some(Command::Say("/shrug".to_string())));
    }
}
