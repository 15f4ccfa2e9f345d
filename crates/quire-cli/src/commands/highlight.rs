//! /highlight and /select: targeted edits of part of the artifact

use super::CommandResult;
use quire_engine::{CharSpan, Directive, Highlight, TextSelection};

pub struct HighlightCommand;

impl HighlightCommand {
    /// `/highlight <start> <end> <instruction>`, character offsets, end exclusive
    pub fn span(args: &str) -> CommandResult {
        let mut parts = args.splitn(3, char::is_whitespace);
        let start = parts.next().and_then(|s| s.parse::<usize>().ok());
        let end = parts.next().and_then(|s| s.trim().parse::<usize>().ok());
        let (Some(start), Some(end), Some(instruction)) = (start, end, instruction(parts.next()))
        else {
            return CommandResult::Message(
                "Usage: /highlight <start> <end> <instruction>".to_string(),
            );
        };
        if start >= end {
            return CommandResult::Message("Highlight start must be before its end".to_string());
        }

        CommandResult::Turn {
            directive: Directive::Highlight(Highlight::Span(CharSpan { start, end })),
            instruction: Some(instruction),
        }
    }

    /// `/select <text> | <instruction>`
    pub fn excerpt(args: &str) -> CommandResult {
        let Some((text, rest)) = args.split_once('|') else {
            return usage_select();
        };
        let text = text.trim();
        let Some(instruction) = instruction(Some(rest)) else {
            return usage_select();
        };
        if text.is_empty() {
            return usage_select();
        }

        CommandResult::Turn {
            directive: Directive::Highlight(Highlight::Excerpt(TextSelection {
                selected_text: text.to_string(),
            })),
            instruction: Some(instruction),
        }
    }
}

fn usage_select() -> CommandResult {
    CommandResult::Message("Usage: /select <text> | <instruction>".to_string())
}

/// The edit request that accompanies a highlight
fn instruction(rest: Option<&str>) -> Option<String> {
    rest.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_with_instruction() {
        match HighlightCommand::span("2 4 make it louder") {
            CommandResult::Turn {
                directive: Directive::Highlight(Highlight::Span(span)),
                instruction,
            } => {
                assert_eq!(span, CharSpan { start: 2, end: 4 });
                assert_eq!(instruction.as_deref(), Some("make it louder"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_span_rejects_bad_ranges() {
        assert!(matches!(HighlightCommand::span("4 2 louder"), CommandResult::Message(_)));
        assert!(matches!(HighlightCommand::span("x"), CommandResult::Message(_)));
        assert!(matches!(HighlightCommand::span("2 4"), CommandResult::Message(_)));
    }

    #[test]
    fn test_excerpt_splits_on_pipe() {
        match HighlightCommand::excerpt("soft rain | make it a storm") {
            CommandResult::Turn {
                directive: Directive::Highlight(Highlight::Excerpt(sel)),
                instruction,
            } => {
                assert_eq!(sel.selected_text, "soft rain");
                assert_eq!(instruction.as_deref(), Some("make it a storm"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(HighlightCommand::excerpt("soft rain"), CommandResult::Message(_)));
        assert!(matches!(HighlightCommand::excerpt(" | louder"), CommandResult::Message(_)));
    }
}
