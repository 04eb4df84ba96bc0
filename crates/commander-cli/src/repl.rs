//! Line parsing for `commander repl`

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Deliver this text
    Send(String),
    History,
    /// Re-send a history entry, 1 being the most recent
    Resend(usize),
    Launch,
    Status,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

pub const HELP: &str = "\
Type a command and press Enter to send it.
  :history      list recent commands
  :resend <n>   send history entry n again
  :launch       launch the target application
  :status       show permissions and running state
  :help         show this help
  :quit         exit";

pub fn parse_line(line: &str) -> ReplCommand {
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = line.strip_prefix(':') else {
        return ReplCommand::Send(line.to_string());
    };

    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("history" | "h"), None, _) => ReplCommand::History,
        (Some("resend" | "r"), Some(n), None) => match n.parse::<usize>() {
            Ok(n) if n > 0 => ReplCommand::Resend(n),
            _ => ReplCommand::Invalid(format!("not a history number: {}", n)),
        },
        (Some("resend" | "r"), None, _) => {
            ReplCommand::Invalid("usage: :resend <n>".to_string())
        }
        (Some("launch"), None, _) => ReplCommand::Launch,
        (Some("status"), None, _) => ReplCommand::Status,
        (Some("help" | "?"), None, _) => ReplCommand::Help,
        (Some("quit" | "q" | "exit"), None, _) => ReplCommand::Quit,
        _ => ReplCommand::Invalid(format!("unknown command: {}", line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_sent_verbatim() {
        assert_eq!(
            parse_line("refactor the parser"),
            ReplCommand::Send("refactor the parser".to_string())
        );
        assert_eq!(parse_line("  "), ReplCommand::Send("  ".to_string()));
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(parse_line(""), ReplCommand::Empty);
    }

    #[test]
    fn test_meta_commands() {
        assert_eq!(parse_line(":history"), ReplCommand::History);
        assert_eq!(parse_line(":launch"), ReplCommand::Launch);
        assert_eq!(parse_line(":status"), ReplCommand::Status);
        assert_eq!(parse_line(":q"), ReplCommand::Quit);
        assert_eq!(parse_line(":help"), ReplCommand::Help);
    }

    #[test]
    fn test_resend() {
        assert_eq!(parse_line(":resend 3"), ReplCommand::Resend(3));
        assert_eq!(parse_line(":r 1"), ReplCommand::Resend(1));
        assert!(matches!(parse_line(":resend 0"), ReplCommand::Invalid(_)));
        assert!(matches!(parse_line(":resend x"), ReplCommand::Invalid(_)));
        assert!(matches!(parse_line(":resend"), ReplCommand::Invalid(_)));
    }

    #[test]
    fn test_unknown_meta_command() {
        assert!(matches!(parse_line(":deploy"), ReplCommand::Invalid(_)));
        assert!(matches!(parse_line(":quit now"), ReplCommand::Invalid(_)));
    }
}
