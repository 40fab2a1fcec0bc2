//! Validated course data model.
//!
//! These are the shapes persisted in the library, embedded in exported study
//! pages and exchanged as JSON backups. Field names are camelCase so files
//! written by earlier versions of the authoring tool load unchanged. Nothing
//! in here comes straight from a model response: see [`crate::raw`] for the
//! untyped shapes and their mapping functions.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// Default course duration label.
pub const DEFAULT_DURATION: &str = "64 horas";

/// A complete course: skeleton plus whatever units have been built so far.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
    pub title: String,
    #[serde(default = "default_duration")]
    pub duration: String,
    #[serde(default)]
    pub subject_code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrumentation: Option<Instrumentation>,
    pub units: Vec<Unit>,
    /// Placeholder list kept for file compatibility; never populated.
    #[serde(default)]
    pub final_projects: Vec<serde_json::Value>,
    #[serde(default)]
    pub student_list: Vec<AuthorizedStudent>,
}

fn default_duration() -> String {
    DEFAULT_DURATION.to_string()
}

impl Course {
    /// Find a unit by id.
    pub fn unit(&self, unit_id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == unit_id)
    }

    /// Find a unit by id, mutably.
    pub fn unit_mut(&mut self, unit_id: &str) -> Option<&mut Unit> {
        self.units.iter_mut().find(|u| u.id == unit_id)
    }

    /// Number of units that already have lessons.
    pub fn built_unit_count(&self) -> usize {
        self.units.iter().filter(|u| u.is_built()).count()
    }
}

/// A unit of the curriculum. Units without lessons are "unbuilt".
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Unit {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Unit {
    pub fn is_built(&self) -> bool {
        !self.lessons.is_empty()
    }

    pub fn lesson(&self, lesson_id: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == lesson_id)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// Kind tag carried by a block.
///
/// Tags are read case-insensitively and unknown tags read as
/// [`BlockKind::Theory`]. The tag alone does not decide whether a block is
/// graded as an activity; see [`classify_block`](crate::scoring::classify_block).
#[derive(Serialize, JsonSchema, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    #[default]
    Theory,
    Example,
    Activity,
    Test,
}

impl BlockKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "example" => BlockKind::Example,
            "activity" => BlockKind::Activity,
            "test" => BlockKind::Test,
            _ => BlockKind::Theory,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Theory => "theory",
            BlockKind::Example => "example",
            BlockKind::Activity => "activity",
            BlockKind::Test => "test",
        }
    }
}

impl<'de> Deserialize<'de> for BlockKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(BlockKind::from_tag(&tag))
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The smallest content unit within a lesson.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(rename = "type", default)]
    pub kind: BlockKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rubric: Vec<RubricItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_questions: Vec<Question>,
}

impl Block {
    /// Questions of a test block. Other kinds never expose questions, even if
    /// a file carried some.
    pub fn questions(&self) -> &[Question] {
        if self.kind == BlockKind::Test {
            &self.test_questions
        } else {
            &[]
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RubricItem {
    pub criterion: String,
    pub points: f64,
    #[serde(default)]
    pub description: String,
}

/// A multiple-choice question inside a test block.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    #[serde(default)]
    pub feedback: String,
}

impl Question {
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_answer_index
    }
}

/// A student allowed to use the exported study page.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AuthorizedStudent {
    pub id: String,
    pub name: String,
    /// One-time 4-digit PIN. Not a secret.
    pub pin: String,
}

/// Logged-in teacher session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeacherProfile {
    pub id: String,
    pub name: String,
    pub role: String,
    pub joined_at: i64,
}

/// What the teacher asks for when generating a new course.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub topic: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub format: String,
    /// One student per line: `<id> <full name>`.
    #[serde(default)]
    pub student_list_raw: String,
}

/// Didactic instrumentation requested alongside the skeleton.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Instrumentation {
    #[serde(default)]
    pub characterization: String,
    #[serde(default)]
    pub didactic_intent: String,
    #[serde(default)]
    pub subject_competency: String,
    #[serde(default)]
    pub analysis_by_unit: Vec<UnitAnalysis>,
    #[serde(default)]
    pub evaluation_matrix: Vec<EvaluationEntry>,
    #[serde(default)]
    pub calendar: Vec<CalendarWeek>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UnitAnalysis {
    pub unit_title: String,
    pub competency_description: String,
    pub indicators_of_reach: String,
    pub hours: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationEntry {
    pub evidence: String,
    pub percentage: f64,
    pub indicators: String,
    pub evaluation_type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct CalendarWeek {
    pub week: u32,
    pub planned: String,
}

/// Advisory grade produced by the grading call. Never persisted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub score: f64,
    pub authenticity_score: f64,
    pub general_feedback: String,
    pub strengths: Vec<String>,
    pub improvement_areas: Vec<String>,
}

impl Grade {
    /// A zero grade carrying only an explanation.
    pub fn zero(feedback: impl Into<String>) -> Self {
        Self {
            general_feedback: feedback.into(),
            ..Default::default()
        }
    }
}

/// Student-side delivery record downloaded from the study page.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub student_name: String,
    pub student_control_number: String,
    pub lesson_title: String,
    pub activity_title: String,
    pub content: String,
    pub reflection: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub ai_score: f64,
    #[serde(default)]
    pub authenticity_score: f64,
}
