//! quire-ai: model invocation layer
//!
//! Message and content types, streaming events, and the provider trait the
//! orchestration engine calls through.

pub mod error;
pub mod models;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use stream::MessageEventStream;
pub use types::*;
