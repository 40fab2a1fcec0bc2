//! Studio configuration with sensible defaults.
//!
//! [`StudioConfig`] holds the model settings, the data directory, and where
//! the credential comes from. The credential itself is resolved at call time
//! by [`resolve_api_key`](StudioConfig::resolve_api_key), so a missing key is
//! reported when a generation is attempted rather than at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StudioError};

/// Default model for all generation calls.
pub const DEFAULT_MODEL: &str = "google/gemini-3-flash-preview";

/// Environment variable read for the credential when none is set explicitly.
pub const DEFAULT_API_KEY_VAR: &str = "OPENROUTER_KEY";

/// Level used when building unit content from the viewer.
pub const DEFAULT_UNIT_LEVEL: &str = "Ingeniería Superior";

#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,
    /// Maximum tokens per response. Default: `16384`.
    pub max_tokens: u32,
    /// Sampling temperature. Default: `0.4`.
    pub temperature: f32,
    /// HTTP timeout for one round trip. Default: 120 s.
    pub timeout: Duration,
    /// Directory holding the library and teacher session files.
    pub data_dir: PathBuf,
    /// Level passed to unit-content generation.
    pub unit_level: String,
    /// Environment variable consulted by [`resolve_api_key`](Self::resolve_api_key).
    pub api_key_var: String,
    /// Explicit credential; takes precedence over the environment.
    pub api_key: Option<String>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 16384,
            temperature: 0.4,
            timeout: Duration::from_secs(120),
            data_dir: PathBuf::from(".profesoria"),
            unit_level: DEFAULT_UNIT_LEVEL.to_string(),
            api_key_var: DEFAULT_API_KEY_VAR.to_string(),
            api_key: None,
        }
    }
}

impl StudioConfig {
    /// Resolve the credential: the explicit value if non-blank, otherwise the
    /// configured environment variable if non-blank.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref()
            && !key.trim().is_empty()
        {
            return Ok(key.trim().to_string());
        }
        match std::env::var(&self.api_key_var) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(StudioError::Configuration(format!(
                "la variable {} no está definida",
                self.api_key_var
            ))),
        }
    }
}
