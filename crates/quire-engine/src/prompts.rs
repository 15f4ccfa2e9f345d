//! Prompt templates
//!
//! Every generation prompt carries the formatted reflections block so the
//! model sees the user's style rules and known facts.

use crate::artifact::ArtifactContent;

/// Opening instructions shared by every artifact-editing prompt
pub const EDIT_PREAMBLE: &str = "You are an AI assistant tasked with editing an artifact the user is \
working on. The artifact is either a markdown document or a piece of code. Return only the \
updated artifact, with no commentary before or after it and no wrapping code fence.";

fn memories_section(reflections: &str) -> String {
    format!(
        "Here is what you remember about this user and how they like things written. \
Apply the style rules unless the request says otherwise.\n<memories>\n{}\n</memories>",
        reflections
    )
}

/// The artifact body with its metadata, as embedded in prompts
pub fn artifact_block(content: &ArtifactContent) -> String {
    match content {
        ArtifactContent::Text { title, full_markdown, .. } => format!(
            "<artifact type=\"text\" title=\"{}\">\n{}\n</artifact>",
            title, full_markdown
        ),
        ArtifactContent::Code {
            title,
            language,
            code,
            ..
        } => format!(
            "<artifact type=\"code\" title=\"{}\" language=\"{}\">\n{}\n</artifact>",
            title, language, code
        ),
    }
}

/// Router prompt. The artifact section and the option text that refers to
/// it are left out entirely when there is no artifact.
pub fn router_prompt(transcript: &str, artifact: Option<&ArtifactContent>) -> String {
    let mut prompt = String::from(
        "You are routing a user's latest message in a conversation with a writing and coding \
assistant. Decide which single action to take.\n\nOptions:\n",
    );
    match artifact {
        Some(_) => prompt.push_str(
            "- generateArtifact: the user wants the artifact changed or rewritten, or wants a \
new artifact to replace it.\n\
- respondToQuery: the user is asking a question, chatting, or asking about the artifact \
without wanting it changed.\n",
        ),
        None => prompt.push_str(
            "- generateArtifact: the user wants something written or generated, such as an \
essay, a poem, an email or a piece of code.\n\
- respondToQuery: the user is asking a question or chatting and does not need a \
document produced.\n",
        ),
    }
    if let Some(content) = artifact {
        prompt.push_str(&format!(
            "\nThe artifact currently looks like this:\n{}\n",
            artifact_block(content)
        ));
    }
    prompt.push_str(&format!(
        "\nRecent messages:\n<conversation>\n{}\n</conversation>\n\nCall the route_query tool \
with your decision.",
        transcript
    ));
    prompt
}

pub fn create_prompt(reflections: &str) -> String {
    format!(
        "You are an AI assistant that writes artifacts for the user: markdown documents or \
code. Write the artifact the user asks for.\n\n\
- Decide whether the request calls for text or code.\n\
- Give the artifact a short descriptive title.\n\
- For code, set the programming language.\n\
- Put the complete artifact body in the artifact field, with no wrapping code fence.\n\n{}\n\n\
Call the generate_artifact tool with the result.",
        memories_section(reflections)
    )
}

/// Classification over a short preview of the current artifact
pub fn rewrite_meta_prompt(preview: &str, current: &ArtifactContent, transcript: &str) -> String {
    format!(
        "An artifact is about to be rewritten based on the user's latest request. Decide whether \
the rewrite should be text or code, whether the title still fits, and for code which language \
to use.\n\nCurrent type: {}\nCurrent title: {}\nStart of the current artifact:\n<preview>\n{}\n\
</preview>\n\nConversation:\n<conversation>\n{}\n</conversation>\n\nOnly provide a new title if \
the request changes the topic. Call the update_artifact_meta tool.",
        current.kind(),
        current.title(),
        preview,
        transcript
    )
}

pub fn rewrite_prompt(reflections: &str, current: &ArtifactContent, target_note: &str) -> String {
    format!(
        "{}\n\nRewrite the artifact below according to the user's latest message. {}\n\n{}\n\n{}",
        EDIT_PREAMBLE,
        target_note,
        artifact_block(current),
        memories_section(reflections)
    )
}

pub fn update_prompt(reflections: &str, before: &str, highlighted: &str, after: &str) -> String {
    format!(
        "You are editing one highlighted section of a larger artifact. The user's latest message \
describes the change.\n\nText before the highlight:\n<before>\n{}\n</before>\n\n\
Highlighted section:\n<highlight>\n{}\n</highlight>\n\nText after the highlight:\n<after>\n{}\n\
</after>\n\nReturn only the replacement for the highlighted section. Do not repeat the \
surrounding text, do not add commentary, and do not wrap the result in a code fence.\n\n{}",
        before,
        highlighted,
        after,
        memories_section(reflections)
    )
}

pub fn quick_action_prompt(
    reflections: &str,
    instruction: &str,
    current: &ArtifactContent,
) -> String {
    format!(
        "{}\n\n{}\n\n{}\n\n{}",
        EDIT_PREAMBLE,
        instruction,
        artifact_block(current),
        memories_section(reflections)
    )
}

/// Custom action prompt; the optional sections are already rendered
pub fn custom_action_prompt(
    prefix: bool,
    user_prompt: &str,
    reflections: Option<&str>,
    recent_history: Option<&str>,
    current: &ArtifactContent,
) -> String {
    let mut sections = Vec::new();
    if prefix {
        sections.push(EDIT_PREAMBLE.to_string());
    }
    sections.push(format!("<custom-instructions>\n{}\n</custom-instructions>", user_prompt));
    if let Some(reflections) = reflections {
        sections.push(memories_section(reflections));
    }
    if let Some(history) = recent_history {
        sections.push(format!(
            "Recent conversation:\n<conversation>\n{}\n</conversation>",
            history
        ));
    }
    sections.push(artifact_block(current));
    sections.join("\n\n")
}

pub fn respond_prompt(reflections: &str, current: Option<&ArtifactContent>) -> String {
    let artifact = match current {
        Some(content) => format!(
            "The user is working on this artifact. You may refer to it but do not rewrite \
it:\n{}",
            artifact_block(content)
        ),
        None => "No artifact has been written yet.".to_string(),
    };
    format!(
        "You are an AI assistant helping a user write documents and code. Reply to the user's \
latest message conversationally.\n\n{}\n\n{}",
        artifact,
        memories_section(reflections)
    )
}

pub fn followup_prompt(reflections: &str, current: &ArtifactContent, transcript: &str) -> String {
    format!(
        "You just finished editing an artifact for the user. Write a very short followup \
message of two or three sentences: say briefly what you did and ask if they want anything \
else changed. Do not repeat the artifact.\n\n{}\n\nConversation:\n<conversation>\n{}\n\
</conversation>\n\n{}",
        artifact_block(current),
        transcript,
        memories_section(reflections)
    )
}

pub fn reflect_prompt(reflections: &str, current: Option<&ArtifactContent>, transcript: &str) -> String {
    let artifact = current
        .map(artifact_block)
        .unwrap_or_else(|| "No artifact.".to_string());
    format!(
        "You maintain long-term memory about a user of a writing and coding assistant. Below are \
the memories stored so far, the latest artifact and the conversation.\n\n\
<current-memories>\n{}\n</current-memories>\n\n{}\n\n<conversation>\n{}\n</conversation>\n\n\
Produce the complete, updated memory. Style rules describe how the user wants artifacts \
written. Content facts describe the user and what they work on. Keep existing entries that \
still hold, drop contradicted ones and add anything new. Call the generate_reflections tool.",
        reflections, artifact, transcript
    )
}
