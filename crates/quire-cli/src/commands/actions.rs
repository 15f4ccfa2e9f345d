//! /actions: manage custom quick actions

use super::CommandResult;
use quire_engine::{CustomQuickAction, CustomQuickActionDraft};

pub struct ActionsCommand;

impl ActionsCommand {
    pub fn execute(args: &str) -> CommandResult {
        let (sub, rest) = args.split_once(' ').unwrap_or((args, ""));
        match sub {
            "" | "list" => CommandResult::ListActions,
            "add" => match parse_draft(rest) {
                Some(draft) => CommandResult::AddAction(draft),
                None => CommandResult::Message(
                    "Usage: /actions add <title> | <prompt> [| reflections,prefix,history]"
                        .to_string(),
                ),
            },
            "rm" | "remove" | "delete" => {
                let id = rest.trim();
                if id.is_empty() {
                    CommandResult::Message("Usage: /actions rm <id>".to_string())
                } else {
                    CommandResult::RemoveAction(id.to_string())
                }
            }
            other => CommandResult::Message(format!("Unknown actions option: {}", other)),
        }
    }

    pub fn list_text(actions: &[CustomQuickAction]) -> String {
        if actions.is_empty() {
            return "No custom actions. Add one with /actions add <title> | <prompt>".to_string();
        }
        let mut output = String::from("Custom actions:\n");
        for action in actions {
            let mut flags = Vec::new();
            if action.include_reflections {
                flags.push("reflections");
            }
            if action.include_prefix {
                flags.push("prefix");
            }
            if action.include_recent_history {
                flags.push("history");
            }
            output.push_str(&format!("  {}  {}", action.id, action.title));
            if !flags.is_empty() {
                output.push_str(&format!(" [{}]", flags.join(", ")));
            }
            output.push('\n');
        }
        output.trim_end().to_string()
    }
}

/// `<title> | <prompt> [| flags]`; without flags every context block is included
fn parse_draft(rest: &str) -> Option<CustomQuickActionDraft> {
    let mut parts = rest.splitn(3, '|').map(str::trim);
    let title = parts.next().filter(|s| !s.is_empty())?;
    let prompt = parts.next().filter(|s| !s.is_empty())?;

    let mut draft = CustomQuickActionDraft {
        title: title.to_string(),
        prompt: prompt.to_string(),
        ..Default::default()
    };
    match parts.next() {
        Some(flags) => {
            for flag in flags.split([',', ' ']).filter(|f| !f.is_empty()) {
                match flag {
                    "reflections" => draft.include_reflections = true,
                    "prefix" => draft.include_prefix = true,
                    "history" => draft.include_recent_history = true,
                    _ => return None,
                }
            }
        }
        None => {
            draft.include_reflections = true;
            draft.include_prefix = true;
            draft.include_recent_history = true;
        }
    }
    Some(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_with_flags() {
        let draft = parse_draft("Tighten | Cut every sentence in half | history").unwrap();
        assert_eq!(draft.title, "Tighten");
        assert_eq!(draft.prompt, "Cut every sentence in half");
        assert!(draft.include_recent_history);
        assert!(!draft.include_reflections);
        assert!(!draft.include_prefix);
    }

    #[test]
    fn test_add_without_flags_includes_everything() {
        let draft = parse_draft("Tighten | Cut it").unwrap();
        assert!(draft.include_reflections && draft.include_prefix && draft.include_recent_history);
    }

    #[test]
    fn test_add_rejects_missing_prompt_or_bad_flag() {
        assert!(parse_draft("Tighten").is_none());
        assert!(parse_draft("Tighten | ").is_none());
        assert!(parse_draft("Tighten | Cut | loud").is_none());
    }

    #[test]
    fn test_subcommands() {
        assert!(matches!(ActionsCommand::execute(""), CommandResult::ListActions));
        match ActionsCommand::execute("rm abc") {
            CommandResult::RemoveAction(id) => assert_eq!(id, "abc"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_list_text_shows_flags() {
        let actions = vec![CustomQuickAction {
            id: "abc".into(),
            title: "Tighten".into(),
            prompt: "Cut it".into(),
            include_reflections: true,
            include_prefix: false,
            include_recent_history: true,
        }];
        assert_eq!(
            ActionsCommand::list_text(&actions),
            "Custom actions:\n  abc  Tighten [reflections, history]"
        );
    }
}
