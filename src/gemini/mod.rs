//! Google Gemini `generateContent` over the REST API.

pub mod client;
pub mod key;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

pub use client::Client;
pub use types::{GenerateContentRequest, GenerateContentResponse};

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("no Gemini API key: write it to the key file or set {}", key::KEY_ENV)]
    MissingKey,
    #[error("Gemini API error (status {status}): {body}")]
    Status { status: u16, body: String },
    #[error("unexpected Gemini response structure: no text in first candidate")]
    EmptyResponse,
}
