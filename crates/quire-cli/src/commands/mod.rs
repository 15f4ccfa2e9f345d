//! Slash commands for interactive mode

mod actions;
mod highlight;
mod quick;
mod versions;

pub use actions::ActionsCommand;
pub use highlight::HighlightCommand;
pub use quick::QuickCommand;
pub use versions::VersionsCommand;

use quire_engine::{ArtifactDocument, CustomQuickActionDraft, Directive, Reflections};

/// Result of executing a slash command
#[derive(Debug)]
pub enum CommandResult {
    /// Show a message to the user
    Message(String),
    /// Run a turn carrying this directive, with an optional instruction
    Turn {
        directive: Directive,
        instruction: Option<String>,
    },
    /// Point the artifact at an older version
    Rewind(u32),
    /// Switch to another thread, or a fresh one
    SwitchThread(Option<String>),
    ShowReflections,
    ClearReflections,
    ListActions,
    AddAction(CustomQuickActionDraft),
    RemoveAction(String),
    Exit,
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, artifact: Option<&ArtifactDocument>) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "quit" | "exit" | "q" => CommandResult::Exit,

        "show" => VersionsCommand::show(artifact),

        "versions" | "v" => VersionsCommand::list(artifact),

        "rewind" | "r" => VersionsCommand::rewind(args, artifact),

        "diff" | "d" => VersionsCommand::diff(args, artifact),

        "quick" => QuickCommand::execute(args),

        "action" | "a" => QuickCommand::custom(args),

        "highlight" | "hl" => HighlightCommand::span(args),

        "select" => HighlightCommand::excerpt(args),

        "reflections" => match args {
            "" => CommandResult::ShowReflections,
            "clear" => CommandResult::ClearReflections,
            other => CommandResult::Message(format!("Unknown reflections option: {}", other)),
        },

        "actions" => ActionsCommand::execute(args),

        "thread" | "t" => {
            if args.is_empty() {
                CommandResult::SwitchThread(None)
            } else {
                CommandResult::SwitchThread(Some(args.to_string()))
            }
        }

        _ => CommandResult::Unknown(command),
    })
}

/// What the assistant remembers, for display
pub fn reflections_text(reflections: &Reflections) -> String {
    if reflections.is_empty() {
        return "Nothing remembered yet.".to_string();
    }
    let mut output = String::new();
    if !reflections.style_rules.is_empty() {
        output.push_str("Style rules:\n");
        for rule in &reflections.style_rules {
            output.push_str(&format!("  - {}\n", rule));
        }
    }
    if !reflections.content.is_empty() {
        output.push_str("About you:\n");
        for fact in &reflections.content {
            output.push_str(&format!("  - {}\n", fact));
        }
    }
    output.trim_end().to_string()
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?             Show this help message
  /show                     Print the current artifact version
  /versions, /v             List artifact versions
  /rewind, /r <n>           Make version n current
  /diff, /d <a> [b]         Diff version a against b (default: current)
  /quick <action> [arg]     Apply a quick action to the artifact
  /action, /a <id>          Run a custom quick action
  /highlight <start> <end> <instruction>
                            Edit only the characters start..end
  /select <text> | <instruction>
                            Edit only the first occurrence of text
  /reflections [clear]      Show or clear what the assistant remembers
  /actions                  List custom quick actions
  /actions add <title> | <prompt>
  /actions rm <id>
  /thread, /t [id]          Switch thread (no id starts a new one)
  /quit, /exit, /q          Exit quire

Quick actions:
  language <english|mandarin|spanish|french|hindi>
  length <shortest|short|long|longest>
  level <pirate|child|teenager|college|phd>
  emojis | comments | logs | fix
  port <language>"#
        .to_string()
}
