use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use super::GeminiError;
use crate::prompt;

pub const KEY_ENV: &str = "GEMINI_API_KEY";

static ASKED: AtomicBool = AtomicBool::new(false);

/// Key file, then `GEMINI_API_KEY`, then (interactive only) the terminal.
pub fn resolve(key_file: Option<&Path>, interactive: bool) -> Result<String, GeminiError> {
    let env = std::env::var(KEY_ENV).ok();
    resolve_with(key_file, env, || {
        if !interactive || ASKED.swap(true, Ordering::SeqCst) {
            return None;
        }
        println!("\n--- Gemini API key ---");
        prompt::read_line("Enter the API key: ")
    })
}

fn resolve_with(
    key_file: Option<&Path>,
    env: Option<String>,
    ask: impl FnOnce() -> Option<String>,
) -> Result<String, GeminiError> {
    if let Some(path) = key_file {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(raw) if !raw.trim().is_empty() => {
                    tracing::info!(path = %path.display(), "loaded api key from file");
                    return Ok(raw.trim().to_string());
                }
                Ok(_) => tracing::warn!(path = %path.display(), "api key file is empty"),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "api key file unreadable")
                }
            }
        }
    }

    if let Some(key) = env.filter(|k| !k.trim().is_empty()) {
        tracing::debug!("loaded api key from {KEY_ENV}");
        return Ok(key.trim().to_string());
    }

    match ask() {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(GeminiError::MissingKey),
    }
}
