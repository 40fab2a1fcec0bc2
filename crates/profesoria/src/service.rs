//! Course generation service: one model round trip per operation.
//!
//! Every operation follows the same path: build the instruction, send one
//! schema-guided request through the [`CompletionBackend`], extract the JSON
//! payload with [`extract_json`], check its required envelope with
//! `jsonschema`, deserialize it into a [`raw`](crate::raw) shape and map that
//! into the validated model. Nothing is retried, cached or written to the
//! library; callers merge the returned values into their own state.
//!
//! Failure policy:
//!
//! - [`generate_course_skeleton`](CourseGenerator::generate_course_skeleton)
//!   and [`generate_unit_content`](CourseGenerator::generate_unit_content)
//!   propagate every error.
//! - [`generate_course_skeleton_or_fallback`](CourseGenerator::generate_course_skeleton_or_fallback)
//!   is the opt-in recovery path: validation and network failures yield
//!   [`fallback_skeleton`] together with the error that caused it. A missing
//!   credential still propagates.
//! - [`grade_submission`](CourseGenerator::grade_submission) never fails.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::api::{CompletionBackend, generate_request_id};
use crate::config::StudioConfig;
use crate::error::{Result, StudioError};
use crate::model::{Course, DEFAULT_DURATION, Grade, Lesson, RubricItem, Unit, UserPreferences};
use crate::prompt::{grading_prompt, skeleton_prompt, unit_content_prompt};
use crate::raw::{
    DEFAULT_SUBJECT_CODE, RawGrade, RawSkeleton, RawUnitContent, parse_student_list,
};
use crate::sanitize::extract_json;
use crate::{ChatRequest, Message, Plugin, ResponseFormat};

/// Feedback attached to the zero grade returned when grading fails.
pub const GRADING_UNAVAILABLE: &str = "El sínodo no pudo evaluar la entrega en este momento.";

/// Subject code marking a placeholder course.
pub const FALLBACK_SUBJECT_CODE: &str = "TEC-ERROR";

const FALLBACK_TITLE: &str = "Nueva Materia (Modo Seguro)";
const FALLBACK_DESCRIPTION: &str = "Hubo un problema con la IA, pero hemos generado este temario \
     de emergencia para que puedas continuar.";

/// Generates skeletons, unit lessons and grades through a [`CompletionBackend`].
pub struct CourseGenerator<B> {
    backend: B,
    config: StudioConfig,
}

impl<B: CompletionBackend> CourseGenerator<B> {
    pub fn new(backend: B, config: StudioConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// Generate a course skeleton from the teacher's preferences.
    ///
    /// The course gets id `course_<ms>`, units `u<i>` with no lessons, the
    /// topic as title when the model gives none, and the roster parsed from
    /// the preferences.
    pub async fn generate_course_skeleton(&self, prefs: &UserPreferences) -> Result<Course> {
        let request_id = generate_request_id();
        info!(%request_id, "Generating course skeleton for topic {:?}", prefs.topic);

        let payload = self
            .round_trip(
                &request_id,
                skeleton_prompt(prefs),
                "course_skeleton",
                ResponseFormat::for_type::<RawSkeleton>("course_skeleton"),
            )
            .await?;
        validate_envelope(&payload, &skeleton_envelope())?;
        let raw: RawSkeleton = deserialize_raw(payload)?;

        let now = Utc::now().timestamp_millis();
        let units: Vec<Unit> = raw
            .units
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, u)| u.into_unit(i))
            .collect();

        let course = Course {
            id: format!("course_{now}"),
            created_at: now,
            title: non_blank(raw.title).unwrap_or_else(|| prefs.topic.clone()),
            duration: DEFAULT_DURATION.to_string(),
            subject_code: non_blank(raw.subject_code)
                .unwrap_or_else(|| DEFAULT_SUBJECT_CODE.to_string()),
            description: raw.description.unwrap_or_default(),
            instrumentation: raw.instrumentation.map(|i| i.into_instrumentation()),
            units,
            final_projects: Vec::new(),
            student_list: parse_student_list(&prefs.student_list_raw),
        };
        info!(
            %request_id,
            "Skeleton {} ready: {:?}, {} units, {} students",
            course.id,
            course.title,
            course.units.len(),
            course.student_list.len()
        );
        Ok(course)
    }

    /// Like [`generate_course_skeleton`](Self::generate_course_skeleton), but
    /// substitutes [`fallback_skeleton`] when the model call or its payload
    /// fails. The error is returned alongside so the caller can still tell
    /// the teacher what happened.
    pub async fn generate_course_skeleton_or_fallback(
        &self,
        prefs: &UserPreferences,
    ) -> Result<(Course, Option<StudioError>)> {
        match self.generate_course_skeleton(prefs).await {
            Ok(course) => Ok((course, None)),
            Err(e) if e.is_configuration() => Err(e),
            Err(e) => {
                warn!("Skeleton generation failed, using placeholder course: {e}");
                Ok((fallback_skeleton(prefs), Some(e)))
            }
        }
    }

    /// Generate the lessons of one unit. Lesson ids are `l_<ms>_<i>`.
    pub async fn generate_unit_content(&self, unit: &Unit, level: &str) -> Result<Vec<Lesson>> {
        let request_id = generate_request_id();
        info!(%request_id, "Building unit {} ({:?}) at level {level:?}", unit.id, unit.title);

        let payload = self
            .round_trip(
                &request_id,
                unit_content_prompt(&unit.title, &unit.summary, level),
                "unit_content",
                ResponseFormat::for_type::<RawUnitContent>("unit_content"),
            )
            .await?;
        validate_envelope(&payload, &unit_content_envelope())?;
        let raw: RawUnitContent = deserialize_raw(payload)?;

        let now = Utc::now().timestamp_millis();
        let lessons: Vec<Lesson> = raw
            .lessons
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, l)| l.into_lesson(format!("l_{now}_{i}"), i))
            .collect();

        info!(
            %request_id,
            "Unit {} built: {} lessons, {} blocks",
            unit.id,
            lessons.len(),
            lessons.iter().map(|l| l.blocks.len()).sum::<usize>()
        );
        Ok(lessons)
    }

    /// Grade a submission against a rubric. Advisory only: any failure,
    /// including a missing credential, yields a zero grade whose feedback
    /// explains that grading was unavailable.
    pub async fn grade_submission(
        &self,
        submission: &str,
        rubric: &[RubricItem],
        lesson_title: &str,
        context: &str,
    ) -> Grade {
        let request_id = generate_request_id();
        info!(
            %request_id,
            "Grading submission for {lesson_title:?} ({} chars)",
            submission.chars().count()
        );

        let prompt = grading_prompt(submission, rubric, lesson_title, context);
        let result: Result<RawGrade> = async {
            let format = ResponseFormat::for_type::<RawGrade>("grade");
            let payload = self.round_trip(&request_id, prompt, "grade", format).await?;
            validate_envelope(&payload, &json!({"type": "object"}))?;
            deserialize_raw::<RawGrade>(payload)
        }
        .await;

        match result {
            Ok(raw) => {
                let grade = raw.into_grade();
                debug!(%request_id, "Grade: score={}, authenticity={}", grade.score, grade.authenticity_score);
                grade
            }
            Err(e) => {
                warn!(%request_id, "Grading unavailable: {e}");
                Grade::zero(GRADING_UNAVAILABLE)
            }
        }
    }

    /// One request, one response, sanitized into a JSON value.
    async fn round_trip(
        &self,
        request_id: &str,
        prompt: String,
        label: &str,
        response_format: ResponseFormat,
    ) -> Result<Value> {
        let api_key = self.config.resolve_api_key()?;

        let request = ChatRequest {
            model: Some(self.config.model.clone()),
            messages: vec![Message::user(prompt)],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format: Some(response_format),
            plugins: Some(vec![Plugin::ResponseHealing]),
        };
        debug!(
            %request_id,
            "Sending {label} request: model={}, prompt={} chars",
            self.config.model,
            request.messages.iter().map(|m| m.content.chars().count()).sum::<usize>()
        );

        let completion = self.backend.complete(&api_key, &request).await?;
        let text = completion
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                warn!(%request_id, "Empty {label} response");
                StudioError::Validation(
                    "El servicio de IA devolvió una respuesta vacía.".to_string(),
                )
            })?;
        debug!(
            %request_id,
            "Received {label} response: {} chars, finish_reason={}",
            text.chars().count(),
            completion.finish_reason.as_deref().unwrap_or("-")
        );

        extract_json(&text).ok_or_else(|| {
            warn!(%request_id, "No JSON payload in {label} response");
            StudioError::Validation("La respuesta del servicio de IA no contiene JSON.".to_string())
        })
    }
}

/// Minimal placeholder course offered when skeleton generation fails.
///
/// One introductory unit, subject code [`FALLBACK_SUBJECT_CODE`], id
/// `course_fb_<ms>`.
pub fn fallback_skeleton(prefs: &UserPreferences) -> Course {
    let now = Utc::now().timestamp_millis();
    Course {
        id: format!("course_fb_{now}"),
        created_at: now,
        title: if prefs.topic.trim().is_empty() {
            FALLBACK_TITLE.to_string()
        } else {
            prefs.topic.clone()
        },
        duration: DEFAULT_DURATION.to_string(),
        subject_code: FALLBACK_SUBJECT_CODE.to_string(),
        description: FALLBACK_DESCRIPTION.to_string(),
        instrumentation: None,
        units: vec![Unit {
            id: "u0".to_string(),
            title: "Unidad 1: Introducción General".to_string(),
            summary: "Conceptos iniciales de la materia.".to_string(),
            lessons: Vec::new(),
        }],
        final_projects: Vec::new(),
        student_list: parse_student_list(&prefs.student_list_raw),
    }
}

// ── Envelope validation ────────────────────────────────────────────

/// Required shape of a skeleton payload: an object with a non-empty `units` array.
fn skeleton_envelope() -> Value {
    json!({
        "type": "object",
        "required": ["units"],
        "properties": {
            "units": {"type": "array", "minItems": 1}
        }
    })
}

/// Required shape of a unit payload: an object with a non-empty `lessons` array.
fn unit_content_envelope() -> Value {
    json!({
        "type": "object",
        "required": ["lessons"],
        "properties": {
            "lessons": {"type": "array", "minItems": 1}
        }
    })
}

fn validate_envelope(payload: &Value, schema: &Value) -> Result<()> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| {
            warn!("Invalid envelope schema: {e}");
            StudioError::Validation("El esquema de validación interno no es válido.".to_string())
        })?;

    let errors: Vec<String> = validator
        .iter_errors(payload)
        .map(|e| format!("{}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        warn!("Envelope validation failed: {}", errors.join("; "));
        Err(StudioError::Validation(
            "La respuesta del servicio de IA no incluye los campos requeridos.".to_string(),
        ))
    }
}

fn deserialize_raw<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| {
        warn!("Unexpected field types in response: {e}");
        StudioError::Validation(
            "La respuesta del servicio de IA tiene un formato inesperado.".to_string(),
        )
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
