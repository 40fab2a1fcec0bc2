//! Convenience re-exports for common `profesoria` types.
//!
//! ```ignore
//! use profesoria::prelude::*;
//! ```
//!
//! Covers generating a course, keeping it in a library, studying it and
//! exporting it. Raw response shapes and prompt internals stay in their
//! modules.

// ── Client ──────────────────────────────────────────────────────────
pub use crate::api::CompletionBackend;
pub use crate::config::StudioConfig;
pub use crate::error::{Result, StudioError};
pub use crate::{ChatCompletion, ChatRequest, Message, OpenRouterClient};

// ── Course model ────────────────────────────────────────────────────
pub use crate::model::{
    Block, BlockKind, Course, Grade, Lesson, Question, RubricItem, Submission, Unit,
    UserPreferences,
};

// ── Generation and study ────────────────────────────────────────────
pub use crate::library::{CourseStore, JsonFileStore, Library, MemoryStore};
pub use crate::service::CourseGenerator;
pub use crate::viewer::{BuildOutcome, BuildTicket, ViewerState};

// ── Export ──────────────────────────────────────────────────────────
pub use crate::export::{course_backup_json, extract_embedded_course, render_player};
