//! Scripted model client shared by the engine's unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use quire_ai::stream::replay;
use quire_ai::{
    Api, AssistantMetadata, Content, Context, Message, MessageEventStream, Model, Provider,
    StreamOptions, Usage,
};

use crate::model::ModelClient;

pub(crate) fn test_model() -> Model {
    Model {
        id: "test-model".into(),
        name: "Test".into(),
        api: Api::AnthropicMessages,
        provider: Provider::Anthropic,
        base_url: "http://localhost".into(),
        context_window: 200_000,
        max_tokens: 4096,
        headers: Default::default(),
    }
}

/// One request the scripted model received
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub model_id: String,
    pub context: Context,
    pub options: StreamOptions,
}

impl RecordedCall {
    /// System prompt plus every message body, for prompt assertions
    pub fn prompt_text(&self) -> String {
        let mut text = self.context.system_prompt.clone().unwrap_or_default();
        for message in &self.context.messages {
            text.push('\n');
            text.push_str(&message.text());
        }
        text
    }
}

pub(crate) enum Scripted {
    Reply(Message),
    Fail(String),
}

/// Replays queued replies in order and records every request
pub(crate) struct ScriptedModel {
    replies: Mutex<Vec<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Scripted>) -> Self {
        Self {
            replies: Mutex::new(replies),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn text(text: &str) -> Scripted {
        Scripted::Reply(Message::assistant(text))
    }

    pub fn tool(name: &str, arguments: serde_json::Value) -> Scripted {
        Scripted::Reply(Message::Assistant {
            content: vec![Content::tool_call(format!("call_{}", name), name, arguments)],
            metadata: AssistantMetadata::default(),
        })
    }

    pub fn failure(message: &str) -> Scripted {
        Scripted::Fail(message.to_string())
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> quire_ai::Result<MessageEventStream> {
        self.calls.lock().push(RecordedCall {
            model_id: model.id.clone(),
            context: context.clone(),
            options: options.clone(),
        });

        let next = {
            let mut replies = self.replies.lock();
            if replies.is_empty() {
                None
            } else {
                Some(replies.remove(0))
            }
        };
        match next {
            Some(Scripted::Reply(message)) => Ok(replay(message, Usage::default())),
            Some(Scripted::Fail(message)) => Err(quire_ai::Error::api("overloaded_error", message)),
            None => Err(quire_ai::Error::api("test", "script exhausted")),
        }
    }
}
