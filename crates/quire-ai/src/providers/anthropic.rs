//! Anthropic Messages API provider

use crate::{
    error::{Error, Result},
    providers::LlmProvider,
    stream::{MessageEvent, MessageEventStream},
    types::{
        AssistantMetadata, Content, Context, Message, Model, StopReason, StreamOptions, Tool,
        ToolChoice, Usage,
    },
};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

const API_VERSION: &str = "2023-06-01";

/// Anthropic API client
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Create from the `ANTHROPIC_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::InvalidApiKey)?;
        Ok(Self::new(api_key))
    }

    fn headers(&self, model: &Model) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", header_value(&self.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert("accept", HeaderValue::from_static("application/json"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        for (key, value) in &model.headers {
            if let (Ok(name), Ok(val)) = (key.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
                headers.insert(name, val);
            }
        }
        Ok(headers)
    }

    fn build_request(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> AnthropicRequest {
        let tools = if context.tools.is_empty() {
            None
        } else {
            Some(convert_tools(&context.tools))
        };

        AnthropicRequest {
            model: model.id.clone(),
            messages: convert_messages(&context.messages),
            max_tokens: options.max_tokens.unwrap_or(model.max_tokens / 4),
            stream: true,
            system: context.system_prompt.clone(),
            temperature: options.temperature,
            tools,
            tool_choice: options.tool_choice.clone(),
            stop_sequences: options.stop_sequences.clone(),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> Result<MessageEventStream> {
        let request = self.build_request(model, context, options);
        let url = format!("{}/v1/messages", model.base_url);

        tracing::debug!(model = %model.id, tools = context.tools.len(), "anthropic request");

        let request_builder = self
            .client
            .post(&url)
            .headers(self.headers(model)?)
            .json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source, model.id.clone())))
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidConfig(format!("invalid header value: {}", e)))
}

/// Translate the SSE wire events into [`MessageEvent`]s
fn create_stream(
    mut event_source: EventSource,
    model_id: String,
) -> impl futures::Stream<Item = MessageEvent> {
    stream! {
        let mut usage = Usage::default();
        let mut stop_reason = StopReason::Stop;
        let mut blocks: Vec<Block> = vec![];
        let mut error_message: Option<String> = None;

        yield MessageEvent::Start {
            message: Message::assistant_empty(),
        };

        while let Some(event_result) = event_source.next().await {
            let message = match event_result {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => message,
                Err(e) => {
                    error_message = Some(e.to_string());
                    stop_reason = StopReason::Error;
                    break;
                }
            };

            match message.event.as_str() {
                "message_start" => {
                    if let Ok(data) = serde_json::from_str::<MessageStartEvent>(&message.data) {
                        apply_usage(&mut usage, &data.message.usage);
                    }
                }
                "content_block_start" => {
                    let Ok(data) = serde_json::from_str::<ContentBlockStartEvent>(&message.data) else {
                        continue;
                    };
                    let index = data.index as usize;
                    while blocks.len() <= index {
                        blocks.push(Block::Empty);
                    }
                    match data.content_block.block_type.as_str() {
                        "text" => {
                            blocks[index] = Block::Text(String::new());
                            yield MessageEvent::TextStart { content_index: index };
                        }
                        "tool_use" => {
                            let id = data.content_block.id.unwrap_or_default();
                            let name = data.content_block.name.unwrap_or_default();
                            blocks[index] = Block::ToolCall {
                                id: id.clone(),
                                name: name.clone(),
                                arguments_json: String::new(),
                            };
                            yield MessageEvent::ToolCallStart { content_index: index, id, name };
                        }
                        _ => {}
                    }
                }
                "content_block_delta" => {
                    let Ok(data) = serde_json::from_str::<ContentBlockDeltaEvent>(&message.data) else {
                        continue;
                    };
                    let index = data.index as usize;
                    match (blocks.get_mut(index), data.delta.delta_type.as_str()) {
                        (Some(Block::Text(text)), "text_delta") => {
                            let delta = data.delta.text.unwrap_or_default();
                            text.push_str(&delta);
                            yield MessageEvent::TextDelta { content_index: index, delta };
                        }
                        (Some(Block::ToolCall { arguments_json, .. }), "input_json_delta") => {
                            let delta = data.delta.partial_json.unwrap_or_default();
                            arguments_json.push_str(&delta);
                            yield MessageEvent::ToolCallDelta { content_index: index, delta };
                        }
                        _ => {}
                    }
                }
                "content_block_stop" => {
                    let Ok(data) = serde_json::from_str::<ContentBlockStopEvent>(&message.data) else {
                        continue;
                    };
                    let index = data.index as usize;
                    match blocks.get(index) {
                        Some(Block::Text(text)) => {
                            yield MessageEvent::TextEnd { content_index: index, text: text.clone() };
                        }
                        Some(Block::ToolCall { id, name, arguments_json }) => {
                            let arguments = serde_json::from_str(arguments_json)
                                .unwrap_or(serde_json::Value::Null);
                            yield MessageEvent::ToolCallEnd {
                                content_index: index,
                                id: id.clone(),
                                name: name.clone(),
                                arguments,
                            };
                        }
                        _ => {}
                    }
                }
                "message_delta" => {
                    if let Ok(data) = serde_json::from_str::<MessageDeltaEvent>(&message.data) {
                        if let Some(reason) = data.delta.stop_reason {
                            stop_reason = map_stop_reason(&reason);
                        }
                        apply_usage(&mut usage, &data.usage);
                    }
                }
                "message_stop" => break,
                "error" => {
                    error_message = Some(
                        serde_json::from_str::<ErrorEvent>(&message.data)
                            .map(|data| data.error.message)
                            .unwrap_or_else(|_| message.data.clone()),
                    );
                    stop_reason = StopReason::Error;
                    break;
                }
                _ => {}
            }
        }
        event_source.close();

        if let Some(message) = error_message {
            yield MessageEvent::Error { message };
            return;
        }

        let content: Vec<Content> = blocks
            .into_iter()
            .filter_map(|block| match block {
                Block::Text(text) => Some(Content::Text { text }),
                Block::ToolCall { id, name, arguments_json } => {
                    let arguments = serde_json::from_str(&arguments_json)
                        .unwrap_or(serde_json::Value::Null);
                    Some(Content::ToolCall { id, name, arguments })
                }
                Block::Empty => None,
            })
            .collect();

        yield MessageEvent::Done {
            message: Message::Assistant {
                content,
                metadata: AssistantMetadata {
                    model: Some(model_id),
                    usage: usage.clone(),
                    stop_reason: Some(stop_reason),
                    error_message: None,
                    timestamp: chrono::Utc::now().timestamp_millis(),
                },
            },
            stop_reason,
            usage,
        };
    }
}

fn apply_usage(usage: &mut Usage, info: &UsageInfo) {
    if let Some(input) = info.input_tokens {
        usage.input = input;
    }
    usage.output = info.output_tokens;
    usage.cache_read = info.cache_read_input_tokens.unwrap_or(usage.cache_read);
    usage.cache_write = info.cache_creation_input_tokens.unwrap_or(usage.cache_write);
}

#[derive(Debug)]
enum Block {
    Empty,
    Text(String),
    ToolCall {
        id: String,
        name: String,
        arguments_json: String,
    },
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

// ============================================================================
// Response event types
// ============================================================================

#[derive(Debug, Deserialize)]
struct MessageStartEvent {
    message: MessageInfo,
}

#[derive(Debug, Deserialize)]
struct MessageInfo {
    usage: UsageInfo,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: u32,
    cache_read_input_tokens: Option<u32>,
    cache_creation_input_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStartEvent {
    index: u32,
    content_block: ContentBlockInfo,
}

#[derive(Debug, Deserialize)]
struct ContentBlockInfo {
    #[serde(rename = "type")]
    block_type: String,
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDeltaEvent {
    index: u32,
    delta: DeltaInfo,
}

#[derive(Debug, Deserialize)]
struct DeltaInfo {
    #[serde(rename = "type")]
    delta_type: String,
    text: Option<String>,
    partial_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStopEvent {
    index: u32,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaEvent {
    delta: MessageDelta,
    usage: UsageInfo,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEvent {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

// ============================================================================
// Conversion functions
// ============================================================================

fn convert_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
    let mut result = vec![];

    for message in messages {
        match message {
            Message::User { content, .. } => {
                let blocks: Vec<serde_json::Value> = content
                    .iter()
                    .filter_map(|c| match c {
                        Content::Text { text } => {
                            Some(serde_json::json!({ "type": "text", "text": text }))
                        }
                        Content::ToolCall { .. } => None,
                    })
                    .collect();
                result.push(AnthropicMessage {
                    role: "user",
                    content: serde_json::Value::Array(blocks),
                });
            }
            Message::Assistant { content, .. } => {
                let blocks: Vec<serde_json::Value> = content
                    .iter()
                    .map(|c| match c {
                        Content::Text { text } => {
                            serde_json::json!({ "type": "text", "text": text })
                        }
                        Content::ToolCall {
                            id,
                            name,
                            arguments,
                        } => serde_json::json!({
                            "type": "tool_use",
                            "id": id,
                            "name": name,
                            "input": arguments
                        }),
                    })
                    .collect();
                if !blocks.is_empty() {
                    result.push(AnthropicMessage {
                        role: "assistant",
                        content: serde_json::Value::Array(blocks),
                    });
                }
            }
            Message::ToolResult {
                tool_call_id,
                content,
                is_error,
                ..
            } => {
                let text = content
                    .iter()
                    .filter_map(|c| c.as_text())
                    .collect::<Vec<_>>()
                    .join("\n");
                result.push(AnthropicMessage {
                    role: "user",
                    content: serde_json::json!([{
                        "type": "tool_result",
                        "tool_use_id": tool_call_id,
                        "content": text,
                        "is_error": is_error
                    }]),
                });
            }
        }
    }

    result
}

fn convert_tools(tools: &[Tool]) -> Vec<AnthropicTool> {
    tools
        .iter()
        .map(|tool| {
            let mut input_schema = tool.parameters.clone();
            match input_schema.as_object_mut() {
                Some(obj) => {
                    obj.entry("type").or_insert(serde_json::json!("object"));
                }
                None => {
                    input_schema = serde_json::json!({ "type": "object", "properties": {} });
                }
            }
            AnthropicTool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema,
            }
        })
        .collect()
}

fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "max_tokens" => StopReason::Length,
        "tool_use" => StopReason::ToolUse,
        _ => StopReason::Stop,
    }
}
