//! Model invocation seam
//!
//! Every generation step goes through [`ModelClient`]. Plain replies are
//! collected with [`complete`]; schema-constrained results with
//! [`complete_structured`], which forces a single tool call and validates its
//! arguments before handing them back. The `_streaming` variants forward the
//! tool call's partial JSON as it arrives.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use quire_ai::providers::LlmProvider;
use quire_ai::providers::anthropic::AnthropicProvider;
use quire_ai::stream::{MessageBuilder, MessageEvent};
use quire_ai::{Context, Message, MessageEventStream, Model, StreamOptions, Tool, Usage};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Anything that can stream a model response for a request
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> quire_ai::Result<MessageEventStream>;
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Calls a provider directly, retrying retryable failures to open the stream
pub struct ProviderClient {
    provider: Arc<dyn LlmProvider>,
    retry_config: RetryConfig,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            retry_config: RetryConfig::default(),
        }
    }

    /// Anthropic client using the given key, or `ANTHROPIC_API_KEY` when absent
    pub fn anthropic(api_key: Option<&str>) -> quire_ai::Result<Self> {
        let provider = match api_key {
            Some(key) => AnthropicProvider::new(key.to_string()),
            None => AnthropicProvider::from_env()?,
        };
        Ok(Self::new(Arc::new(provider)))
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }
}

#[async_trait]
impl ModelClient for ProviderClient {
    async fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> quire_ai::Result<MessageEventStream> {
        let mut attempt = 0u32;
        loop {
            match self.provider.stream(model, context, options).await {
                Ok(stream) => return Ok(stream),
                Err(e) if e.is_retryable() && attempt < self.retry_config.max_retries => {
                    let delay = self.retry_config.delay_for_attempt(attempt);
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt + 1,
                        self.retry_config.max_retries + 1,
                        e,
                        delay
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// A finished model reply
#[derive(Debug, Clone)]
pub struct Completion {
    pub message: Message,
    pub usage: Usage,
}

impl Completion {
    pub fn text(&self) -> String {
        self.message.text()
    }
}

/// Run a request to completion, handing each text delta to `on_delta`
pub async fn complete(
    client: &dyn ModelClient,
    model: &Model,
    context: &Context,
    options: &StreamOptions,
    mut on_delta: impl FnMut(&str) + Send,
) -> Result<Completion> {
    complete_with(client, model, context, options, |event| {
        if let MessageEvent::TextDelta { delta, .. } = event {
            on_delta(delta);
        }
    })
    .await
}

async fn complete_with(
    client: &dyn ModelClient,
    model: &Model,
    context: &Context,
    options: &StreamOptions,
    mut on_event: impl FnMut(&MessageEvent) + Send,
) -> Result<Completion> {
    let mut stream = client.stream(model, context, options).await?;
    let mut builder = MessageBuilder::new();
    let mut finished = false;

    while let Some(event) = stream.next().await {
        builder.process_event(&event);
        match &event {
            MessageEvent::TextDelta { .. } | MessageEvent::ToolCallDelta { .. } => {
                on_event(&event)
            }
            MessageEvent::Done { .. } => finished = true,
            MessageEvent::Error { .. } => break,
            _ => {}
        }
    }

    if let Some(message) = builder.error() {
        return Err(quire_ai::Error::api("stream_error", message).into());
    }
    if !finished {
        return Err(quire_ai::Error::UnexpectedResponse(
            "stream ended before the message completed".into(),
        )
        .into());
    }

    let usage = builder.usage().clone();
    let mut message = builder.build();
    if let Message::Assistant { metadata, .. } = &mut message {
        metadata.model = Some(model.id.clone());
    }
    Ok(Completion { message, usage })
}

/// Force the model to answer through `tool` and return its validated arguments
pub async fn complete_structured(
    client: &dyn ModelClient,
    model: &Model,
    context: Context,
    options: StreamOptions,
    tool: &Tool,
) -> Result<(serde_json::Value, Usage)> {
    complete_structured_streaming(client, model, context, options, tool, |_| {}).await
}

/// [`complete_structured`], handing each partial-JSON argument delta to `on_delta`
pub async fn complete_structured_streaming(
    client: &dyn ModelClient,
    model: &Model,
    mut context: Context,
    options: StreamOptions,
    tool: &Tool,
    mut on_delta: impl FnMut(&str) + Send,
) -> Result<(serde_json::Value, Usage)> {
    let validator = jsonschema::validator_for(&tool.parameters).map_err(|e| {
        Error::StructuredOutput(format!("invalid schema for '{}': {}", tool.name, e))
    })?;

    context.tools = vec![tool.clone()];
    let options = StreamOptions {
        tool_choice: StreamOptions::forced_tool(&tool.name).tool_choice,
        ..options
    };

    let completion = complete_with(client, model, &context, &options, |event| {
        if let MessageEvent::ToolCallDelta { delta, .. } = event {
            on_delta(delta);
        }
    })
    .await?;
    let Some(arguments) = completion
        .message
        .tool_calls()
        .into_iter()
        .find(|(_, name, _)| *name == tool.name)
        .map(|(_, _, arguments)| arguments.clone())
    else {
        return Err(Error::StructuredOutput(format!(
            "model did not call '{}'",
            tool.name
        )));
    };

    if let Some(message) = validate_with_validator(&arguments, &validator) {
        return Err(Error::StructuredOutput(format!("'{}': {}", tool.name, message)));
    }
    Ok((arguments, completion.usage))
}

/// [`complete_structured`], deserialized into `T`
pub async fn complete_as<T: DeserializeOwned>(
    client: &dyn ModelClient,
    model: &Model,
    context: Context,
    options: StreamOptions,
    tool: &Tool,
) -> Result<(T, Usage)> {
    complete_as_streaming(client, model, context, options, tool, |_| {}).await
}

/// [`complete_structured_streaming`], deserialized into `T`
pub async fn complete_as_streaming<T: DeserializeOwned>(
    client: &dyn ModelClient,
    model: &Model,
    context: Context,
    options: StreamOptions,
    tool: &Tool,
    on_delta: impl FnMut(&str) + Send,
) -> Result<(T, Usage)> {
    let (arguments, usage) =
        complete_structured_streaming(client, model, context, options, tool, on_delta).await?;
    let value = serde_json::from_value(arguments)
        .map_err(|e| Error::StructuredOutput(format!("'{}': {}", tool.name, e)))?;
    Ok((value, usage))
}

/// Returns `Some(error_message)` if validation fails, `None` if valid.
fn validate_with_validator(
    args: &serde_json::Value,
    validator: &jsonschema::Validator,
) -> Option<String> {
    let errors: Vec<String> = validator
        .iter_errors(args)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!("argument validation failed:\n{}", errors.join("\n")))
    }
}
