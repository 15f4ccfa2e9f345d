//! /quick and /action: predefined and custom quick actions

use super::CommandResult;
use quire_engine::{
    ArtifactLength, Directive, ProgrammingLanguage, QuickActionRequest, ReadingLevel,
    TargetLanguage,
};

pub struct QuickCommand;

impl QuickCommand {
    pub fn execute(args: &str) -> CommandResult {
        match parse_quick_action(args) {
            Ok(action) => turn(action),
            Err(msg) => CommandResult::Message(msg),
        }
    }

    pub fn custom(args: &str) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message("Usage: /action <id> (see /actions)".to_string());
        }
        turn(QuickActionRequest::Custom(args.to_string()))
    }
}

fn turn(action: QuickActionRequest) -> CommandResult {
    CommandResult::Turn {
        directive: Directive::QuickAction(action),
        instruction: None,
    }
}

fn parse_quick_action(args: &str) -> Result<QuickActionRequest, String> {
    let mut parts = args.split_whitespace();
    let kind = parts.next().unwrap_or("").to_lowercase();
    let arg = parts.next().unwrap_or("");

    match kind.as_str() {
        "language" | "lang" => TargetLanguage::parse(arg)
            .map(QuickActionRequest::ChangeLanguage)
            .ok_or_else(|| choices("language", TargetLanguage::ALL.iter().map(|l| l.as_str()))),
        "length" => ArtifactLength::parse(arg)
            .map(QuickActionRequest::ChangeLength)
            .ok_or_else(|| choices("length", ArtifactLength::ALL.iter().map(|l| l.as_str()))),
        "level" => ReadingLevel::parse(arg)
            .map(QuickActionRequest::ChangeReadingLevel)
            .ok_or_else(|| choices("level", ReadingLevel::ALL.iter().map(|l| l.as_str()))),
        "emojis" | "emoji" => Ok(QuickActionRequest::AddEmojis),
        "comments" => Ok(QuickActionRequest::AddComments),
        "logs" => Ok(QuickActionRequest::AddLogs),
        "fix" | "fix-bugs" => Ok(QuickActionRequest::FixBugs),
        "port" => ProgrammingLanguage::parse(arg)
            .filter(|l| *l != ProgrammingLanguage::Other)
            .map(QuickActionRequest::PortLanguage)
            .ok_or_else(|| {
                choices(
                    "port",
                    ProgrammingLanguage::ALL
                        .iter()
                        .filter(|l| **l != ProgrammingLanguage::Other)
                        .map(|l| l.as_str()),
                )
            }),
        "" => Err("Usage: /quick <action> [arg] (see /help)".to_string()),
        other => Err(format!("Unknown quick action: {}", other)),
    }
}

fn choices<'a>(kind: &str, options: impl Iterator<Item = &'a str>) -> String {
    format!(
        "Usage: /quick {} <{}>",
        kind,
        options.collect::<Vec<_>>().join("|")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_each_kind() {
        assert_eq!(
            parse_quick_action("language French"),
            Ok(QuickActionRequest::ChangeLanguage(TargetLanguage::French))
        );
        assert_eq!(
            parse_quick_action("length shortest"),
            Ok(QuickActionRequest::ChangeLength(ArtifactLength::Shortest))
        );
        assert_eq!(
            parse_quick_action("level pirate"),
            Ok(QuickActionRequest::ChangeReadingLevel(ReadingLevel::Pirate))
        );
        assert_eq!(parse_quick_action("emojis"), Ok(QuickActionRequest::AddEmojis));
        assert_eq!(parse_quick_action("fix"), Ok(QuickActionRequest::FixBugs));
        assert_eq!(
            parse_quick_action("port rust"),
            Ok(QuickActionRequest::PortLanguage(ProgrammingLanguage::Rust))
        );
    }

    #[test]
    fn test_bad_argument_lists_choices() {
        let err = parse_quick_action("length medium").unwrap_err();
        assert_eq!(err, "Usage: /quick length <shortest|short|long|longest>");
        assert!(parse_quick_action("port other").is_err());
        assert!(parse_quick_action("dance").unwrap_err().contains("dance"));
    }

    #[test]
    fn test_custom_action_needs_an_id() {
        match QuickCommand::custom("abc-123") {
            CommandResult::Turn {
                directive: Directive::QuickAction(QuickActionRequest::Custom(id)),
                instruction: None,
            } => assert_eq!(id, "abc-123"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(QuickCommand::custom(""), CommandResult::Message(_)));
    }
}
