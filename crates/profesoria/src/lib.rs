//! Course authoring on top of a hosted generative model.
//!
//! `profesoria` lets a teacher generate a course skeleton and per-unit lesson
//! content through the [OpenRouter](https://openrouter.ai/) chat completions
//! API, keep the results in a local library, study them through a viewer
//! state with a live grade, and export a standalone study page that students
//! can use offline.
//!
//! # Getting started
//!
//! ```ignore
//! use profesoria::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> profesoria::Result<()> {
//!     let config = StudioConfig::default();
//!     let client = OpenRouterClient::new(config.timeout)?;
//!     let generator = CourseGenerator::new(client, config.clone());
//!
//!     let prefs = UserPreferences {
//!         topic: "Sistemas Operativos".into(),
//!         level: "Licenciatura".into(),
//!         ..Default::default()
//!     };
//!     let course = generator.generate_course_skeleton(&prefs).await?;
//!
//!     let mut library = Library::open(JsonFileStore::new(&config.data_dir)?)?;
//!     library.add(course)?;
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`model`] | Validated course, unit, lesson, block and grade types |
//! | [`raw`] | Untyped model responses and their default-filling mappings |
//! | [`sanitize`] | JSON extraction from free-form model output |
//! | [`prompt`] | Skeleton, unit-content and grading instructions |
//! | [`service`] | [`CourseGenerator`](service::CourseGenerator): one round trip per operation |
//! | [`scoring`] | Block classification, activity pool, live unit grade, single-attempt tests |
//! | [`viewer`] | Active selection, answers, completion and unit-build tickets |
//! | [`library`] | Persistence port, file and memory stores, import |
//! | [`export`] | Standalone study page, JSON backup, student submissions |
//! | [`api`] | Completion backend trait and request correlation ids |

pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod library;
pub mod model;
pub mod prelude;
pub mod prompt;
pub mod raw;
pub mod sanitize;
pub mod scoring;
pub mod service;
pub mod viewer;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub use error::{Result, StudioError};

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. Used to build the `response_format` constraint
/// from the raw response types.
///
/// # Example
///
/// ```
/// use profesoria::json_schema_for;
/// use profesoria::raw::RawSkeleton;
///
/// let schema = json_schema_for::<RawSkeleton>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["properties"]["units"].is_object());
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub messages: Vec<Message>,

    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "is_zero_f32")]
    pub temperature: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Vec<Plugin>>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

/// JSON output format type.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ResponseFormatType {
    #[serde(rename = "json_schema")]
    JsonSchema,
}

/// JSON output mode constrained by a schema.
#[derive(Serialize, Debug)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub fmt_type: ResponseFormatType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<JsonSchemaFormat>,
}

/// Named schema for `json_schema` response mode.
#[derive(Serialize, Debug)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub strict: bool,
    pub schema: serde_json::Value,
}

impl ResponseFormat {
    /// Schema-guided JSON mode. Not strict: the sanitizer and the raw
    /// mappings tolerate deviations.
    pub fn json_schema(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            fmt_type: ResponseFormatType::JsonSchema,
            json_schema: Some(JsonSchemaFormat {
                name: name.into(),
                strict: false,
                schema,
            }),
        }
    }

    /// Schema-guided JSON mode with the schema generated from `T`.
    pub fn for_type<T: JsonSchema>(name: impl Into<String>) -> Self {
        Self::json_schema(name, json_schema_for::<T>())
    }
}

/// OpenRouter plugin configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "id")]
pub enum Plugin {
    /// Auto-fixes truncated or malformed JSON responses server-side.
    #[serde(rename = "response-healing")]
    ResponseHealing,
}

// ── Message types ──────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from [`OpenRouterClient::chat`].
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    /// Completion carrying only text. Handy for scripted backends.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenRouter chat completions API.
///
/// The client holds no credential; it is passed per call so it can be
/// resolved at the moment a request is made.
pub struct OpenRouterClient {
    pub(crate) client: reqwest::Client,
    pub(crate) referer: String,
    pub(crate) title: String,
}

impl OpenRouterClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_headers(timeout, "https://github.com/profesoria", "profesoria")
    }

    /// Create a client with custom Referer and X-Title headers.
    pub fn with_headers(
        timeout: Duration,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("profesoria/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| StudioError::Configuration(format!("no se pudo crear el cliente HTTP: {e}")))?;
        Ok(Self {
            client,
            referer: referer.into(),
            title: title.into(),
        })
    }

    /// Send one chat completion request. Never retries.
    pub async fn chat(&self, api_key: &str, body: &ChatRequest) -> Result<ChatCompletion> {
        let model_label = body.model.as_deref().unwrap_or("(none)");
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={}, schema={}",
            model_label,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
            body.response_format
                .as_ref()
                .and_then(|f| f.json_schema.as_ref())
                .map_or("none", |s| s.name.as_str()),
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
            .send()
            .await
            .map_err(|e| StudioError::Network(format!("la solicitud falló: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| StudioError::Network(format!("no se pudo leer la respuesta: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(StudioError::Network(format!(
                "OpenRouter respondió HTTP {status}: {text}"
            )));
        }

        let parsed: RawChatResponse = serde_json::from_str(&text)
            .map_err(|e| StudioError::Network(format!("respuesta ilegible de OpenRouter: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(StudioError::Network(format!(
                "OpenRouter devolvió un error: {}",
                err.message
            )));
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }

        let choice = parsed.choices.and_then(|c| c.into_iter().next());
        match choice {
            Some(c) => {
                debug!(
                    "LLM output: {} chars, finish_reason={}",
                    c.message.content.as_ref().map_or(0, |s| s.chars().count()),
                    c.finish_reason.as_deref().unwrap_or("-"),
                );
                Ok(ChatCompletion {
                    content: c.message.content,
                    usage: parsed.usage,
                    finish_reason: c.finish_reason,
                })
            }
            None => {
                debug!("LLM output: empty (no choices)");
                Ok(ChatCompletion {
                    content: None,
                    usage: parsed.usage,
                    finish_reason: None,
                })
            }
        }
    }
}
