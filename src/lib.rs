//! nanobanana-relay - OpenAI-compatible relay for the NanoBanana upstream
//!
//! This library exposes a chat-completion API, forwards each request to a
//! single fixed upstream chat service, and re-emits the answer either as one
//! JSON document or as a paced sequence of SSE chunks.

pub mod config;
pub mod error;
pub mod proxy;

pub use config::Config;
pub use error::{Error, Result};
