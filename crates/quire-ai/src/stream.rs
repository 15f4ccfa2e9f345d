//! Streaming event types and utilities

use crate::types::{AssistantMetadata, Content, Message, StopReason, Usage};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while a model response streams in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEvent {
    /// Initial message structure
    Start { message: Message },
    /// Text content started
    TextStart { content_index: usize },
    /// Text content delta
    TextDelta { content_index: usize, delta: String },
    /// Text content completed
    TextEnd { content_index: usize, text: String },
    /// Tool call started
    ToolCallStart {
        content_index: usize,
        id: String,
        name: String,
    },
    /// Tool call arguments delta (partial JSON)
    ToolCallDelta { content_index: usize, delta: String },
    /// Tool call completed
    ToolCallEnd {
        content_index: usize,
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    /// Message completed successfully
    Done {
        message: Message,
        stop_reason: StopReason,
        usage: Usage,
    },
    /// Error occurred
    Error { message: String },
}

impl MessageEvent {
    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageEvent::Done { .. } | MessageEvent::Error { .. })
    }
}

/// A stream of message events
pub type MessageEventStream = Pin<Box<dyn Stream<Item = MessageEvent> + Send>>;

/// Turn a finished assistant message back into the event sequence a provider
/// would have produced for it.
pub fn replay(message: Message, usage: Usage) -> MessageEventStream {
    let mut events = vec![MessageEvent::Start {
        message: Message::assistant_empty(),
    }];
    for (content_index, content) in message.content().iter().enumerate() {
        match content {
            Content::Text { text } => {
                events.push(MessageEvent::TextStart { content_index });
                events.push(MessageEvent::TextDelta {
                    content_index,
                    delta: text.clone(),
                });
                events.push(MessageEvent::TextEnd {
                    content_index,
                    text: text.clone(),
                });
            }
            Content::ToolCall {
                id,
                name,
                arguments,
            } => {
                events.push(MessageEvent::ToolCallStart {
                    content_index,
                    id: id.clone(),
                    name: name.clone(),
                });
                events.push(MessageEvent::ToolCallDelta {
                    content_index,
                    delta: arguments.to_string(),
                });
                events.push(MessageEvent::ToolCallEnd {
                    content_index,
                    id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                });
            }
        }
    }
    let stop_reason = if message.tool_calls().is_empty() {
        StopReason::Stop
    } else {
        StopReason::ToolUse
    };
    events.push(MessageEvent::Done {
        message,
        stop_reason,
        usage,
    });
    Box::pin(tokio_stream::iter(events))
}

/// Builder for constructing an assistant message from streaming events
#[derive(Debug, Default)]
pub struct MessageBuilder {
    content_buffers: Vec<ContentBuffer>,
    usage: Usage,
    stop_reason: Option<StopReason>,
    error: Option<String>,
}

#[derive(Debug)]
enum ContentBuffer {
    Text(String),
    ToolCall {
        id: String,
        name: String,
        arguments_json: String,
    },
}

impl MessageBuilder {
    /// Create a new message builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a streaming event and update the message state
    pub fn process_event(&mut self, event: &MessageEvent) {
        match event {
            MessageEvent::TextStart { content_index } => {
                self.ensure_buffer(*content_index, ContentBuffer::Text(String::new()));
            }
            MessageEvent::TextDelta {
                content_index,
                delta,
            } => {
                if let Some(ContentBuffer::Text(text)) =
                    self.content_buffers.get_mut(*content_index)
                {
                    text.push_str(delta);
                }
            }
            MessageEvent::TextEnd {
                content_index,
                text,
            } => {
                if *content_index < self.content_buffers.len() {
                    self.content_buffers[*content_index] = ContentBuffer::Text(text.clone());
                }
            }
            MessageEvent::ToolCallStart {
                content_index,
                id,
                name,
            } => {
                self.ensure_buffer(
                    *content_index,
                    ContentBuffer::ToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        arguments_json: String::new(),
                    },
                );
            }
            MessageEvent::ToolCallDelta {
                content_index,
                delta,
            } => {
                if let Some(ContentBuffer::ToolCall { arguments_json, .. }) =
                    self.content_buffers.get_mut(*content_index)
                {
                    arguments_json.push_str(delta);
                }
            }
            MessageEvent::ToolCallEnd {
                content_index,
                id,
                name,
                arguments,
            } => {
                if *content_index < self.content_buffers.len() {
                    self.content_buffers[*content_index] = ContentBuffer::ToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        arguments_json: arguments.to_string(),
                    };
                }
            }
            MessageEvent::Done {
                stop_reason, usage, ..
            } => {
                self.stop_reason = Some(*stop_reason);
                self.usage = usage.clone();
            }
            MessageEvent::Error { message } => {
                self.stop_reason = Some(StopReason::Error);
                self.error = Some(message.clone());
            }
            MessageEvent::Start { .. } => {}
        }
    }

    /// Error reported by the stream, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Usage reported by the final event
    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    /// Build the final message
    pub fn build(self) -> Message {
        let content: Vec<Content> = self
            .content_buffers
            .into_iter()
            .map(|buf| match buf {
                ContentBuffer::Text(text) => Content::Text { text },
                ContentBuffer::ToolCall {
                    id,
                    name,
                    arguments_json,
                } => {
                    let arguments =
                        serde_json::from_str(&arguments_json).unwrap_or(serde_json::Value::Null);
                    Content::ToolCall {
                        id,
                        name,
                        arguments,
                    }
                }
            })
            .collect();

        Message::Assistant {
            content,
            metadata: AssistantMetadata {
                usage: self.usage,
                stop_reason: self.stop_reason,
                error_message: self.error,
                timestamp: chrono::Utc::now().timestamp_millis(),
                ..Default::default()
            },
        }
    }

    /// Text accumulated so far
    pub fn current_text(&self) -> String {
        self.content_buffers
            .iter()
            .filter_map(|buf| match buf {
                ContentBuffer::Text(text) => Some(text.as_str()),
                ContentBuffer::ToolCall { .. } => None,
            })
            .collect()
    }

    fn ensure_buffer(&mut self, index: usize, default: ContentBuffer) {
        while self.content_buffers.len() <= index {
            self.content_buffers.push(ContentBuffer::Text(String::new()));
        }
        self.content_buffers[index] = default;
    }
}
