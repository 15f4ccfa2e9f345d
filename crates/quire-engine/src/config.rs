//! Engine configuration

use std::time::Duration;

use quire_ai::Model;
use quire_ai::models::{DEFAULT_FOLLOWUP_MODEL_ID, DEFAULT_MODEL_ID, get_model_or_default};

/// Settings for one orchestrator
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model for routing, generation and reflection
    pub model: Model,
    /// Smaller model for the post-edit followup
    pub followup_model: Model,
    /// Temperature for artifact generation
    pub temperature: f32,
    /// Temperature for the router and structured sub-steps
    pub classifier_temperature: f32,
    /// Output token cap for generation steps
    pub max_tokens: u32,
    /// Output token cap for followups
    pub followup_max_tokens: u32,
    /// Run the followup step after artifact edits
    pub followup: bool,
    /// Run the reflect step after each turn
    pub reflect: bool,
    pub persistence: PersistenceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: get_model_or_default(DEFAULT_MODEL_ID),
            followup_model: get_model_or_default(DEFAULT_FOLLOWUP_MODEL_ID),
            temperature: 0.5,
            classifier_temperature: 0.0,
            max_tokens: 8192,
            followup_max_tokens: 250,
            followup: true,
            reflect: true,
            persistence: PersistenceConfig::default(),
        }
    }
}

/// Debounced artifact persistence timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceConfig {
    /// Quiet period after the last change before a durable write
    pub debounce: Duration,
    /// Window after a thread switch in which scheduled writes are dropped
    pub guard_window: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(5),
            guard_window: Duration::from_secs(1),
        }
    }
}
