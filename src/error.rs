use thiserror::Error;

/// Failure of one capture-and-analyze cycle.
#[derive(Error, Debug)]
pub enum HintError {
    #[error("Screen capture failed: {0}")]
    Capture(String),
    #[error("Vision API request failed: {0}")]
    Inference(String),
    #[error("Malformed model response: {0}")]
    Parse(String),
    #[error("No API keys configured (set HINTLENS_API_KEYS or GEMINI_KEYS)")]
    NoCredentials,
    #[error("All {attempts} API keys failed, last error: {last}")]
    KeysExhausted { attempts: usize, last: String },
}

/// Shortens `message` to at most `max` characters, appending an ellipsis when cut.
pub fn truncate(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_string(),
    }
}
