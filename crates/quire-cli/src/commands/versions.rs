//! /show, /versions, /rewind and /diff

use super::CommandResult;
use quire_engine::{ArtifactContent, ArtifactDocument};
use similar::{ChangeTag, TextDiff};

const MAX_DIFF_LINES: usize = 200;

pub struct VersionsCommand;

impl VersionsCommand {
    pub fn show(artifact: Option<&ArtifactDocument>) -> CommandResult {
        let Some(doc) = artifact else {
            return no_artifact();
        };
        match doc.current_content() {
            Ok(content) => CommandResult::Message(Self::render(content)),
            Err(e) => CommandResult::Message(format!("Error: {}", e)),
        }
    }

    pub fn list(artifact: Option<&ArtifactDocument>) -> CommandResult {
        let Some(doc) = artifact else {
            return no_artifact();
        };

        let mut output = String::from("Versions:\n");
        for content in doc.versions() {
            let marker = if content.index() == doc.current_index() {
                "*"
            } else {
                " "
            };
            let label = match content.language() {
                Some(lang) => format!("code, {}", lang),
                None => "text".to_string(),
            };
            output.push_str(&format!(
                "{} {:>3}  {} ({}, {} chars)\n",
                marker,
                content.index(),
                content.title(),
                label,
                content.body().chars().count()
            ));
        }
        CommandResult::Message(output.trim_end().to_string())
    }

    pub fn rewind(args: &str, artifact: Option<&ArtifactDocument>) -> CommandResult {
        if artifact.is_none() {
            return no_artifact();
        }
        match args.parse::<u32>() {
            Ok(index) => CommandResult::Rewind(index),
            Err(_) => CommandResult::Message("Usage: /rewind <version>".to_string()),
        }
    }

    pub fn diff(args: &str, artifact: Option<&ArtifactDocument>) -> CommandResult {
        let Some(doc) = artifact else {
            return no_artifact();
        };

        let indices: Result<Vec<u32>, _> = args.split_whitespace().map(str::parse).collect();
        let (from, to) = match indices.as_deref() {
            Ok([from]) => (*from, doc.current_index()),
            Ok([from, to]) => (*from, *to),
            _ => return CommandResult::Message("Usage: /diff <a> [b]".to_string()),
        };

        let (Some(old), Some(new)) = (doc.version(from), doc.version(to)) else {
            return CommandResult::Message(format!(
                "Versions range from 1 to {}",
                doc.latest_index()
            ));
        };

        let mut output = format!("--- v{}\n+++ v{}\n", from, to);
        output.push_str(&generate_diff(old.body(), new.body()));
        CommandResult::Message(output.trim_end().to_string())
    }

    /// Header line plus body of one version
    pub fn render(content: &ArtifactContent) -> String {
        let header = match content.language() {
            Some(lang) => format!("[v{}] {} ({})", content.index(), content.title(), lang),
            None => format!("[v{}] {}", content.index(), content.title()),
        };
        format!("{}\n\n{}", header, content.body())
    }
}

fn no_artifact() -> CommandResult {
    CommandResult::Message("No artifact yet.".to_string())
}

fn generate_diff(old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = Vec::new();

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        let mut line = format!("{}{}", sign, change);
        if change.missing_newline() {
            line.push('\n');
        }
        output.push(line);
    }

    if output.len() > MAX_DIFF_LINES {
        output.truncate(MAX_DIFF_LINES);
        output.push("... (diff truncated)\n".to_string());
    }

    output.join("")
}
