//! HTTP relay module.
//!
//! This module provides the OpenAI-compatible HTTP API that accepts chat
//! requests and forwards them to the upstream.

pub mod auth;
mod handlers;
mod server;
pub mod stream;
pub mod types;
pub mod upstream;

pub use server::{create_router, run_server, AppState};
pub use stream::{FixedDelay, NoDelay, Pacer, PseudoStream, StreamFrame};
pub use types::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, Message};
pub use upstream::{UpstreamClient, UpstreamResult};
