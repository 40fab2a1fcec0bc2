//! Standalone study page, JSON backups and student submissions.
//!
//! The study page is a single HTML document: the course is embedded as a
//! `const COURSE_DATA = …;` literal and a small React player (loaded from
//! public CDNs) re-implements block classification, the activity pool and
//! the live test grade with the constants from [`crate::scoring`].

use chrono::Utc;
use handlebars::Handlebars;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{Result, StudioError};
use crate::model::{Course, Grade, Submission};
use crate::scoring::{ACTIVITY_POINT_POOL, ACTIVITY_TITLE_MARKERS, TEST_GRADE_SCALE};

const PLAYER_TEMPLATE: &str = include_str!("../templates/player.html.hbs");

/// Marker preceding the embedded course literal.
pub const COURSE_DATA_MARKER: &str = "const COURSE_DATA = ";

/// Seconds a student has to write the reflection for an activity.
pub const DEFENSE_SECONDS: u32 = 180;

/// Minimum reflection length, in characters.
pub const MIN_REFLECTION_CHARS: usize = 50;

// ── Study page ─────────────────────────────────────────────────────

/// Render the standalone study page for `course`.
pub fn render_player(course: &Course) -> Result<String> {
    let course_json = script_safe_json(course)?;
    let title_markers = serde_json::to_string(&ACTIVITY_TITLE_MARKERS)
        .map_err(|e| StudioError::Export(format!("no se pudieron serializar los marcadores de actividad: {e}")))?;

    let mut hb = Handlebars::new();
    hb.set_strict_mode(true);
    hb.register_template_string("player", PLAYER_TEMPLATE)
        .map_err(|e| StudioError::Export(format!("la plantilla del aula no es válida: {e}")))?;

    let data = json!({
        "version": env!("CARGO_PKG_VERSION"),
        "title": course.title,
        "course_json": course_json,
        "activity_pool": ACTIVITY_POINT_POOL,
        "test_scale": TEST_GRADE_SCALE,
        "title_markers": title_markers,
        "defense_seconds": DEFENSE_SECONDS,
        "min_reflection_chars": MIN_REFLECTION_CHARS,
    });
    let html = hb
        .render("player", &data)
        .map_err(|e| StudioError::Export(format!("no se pudo generar la página de estudio: {e}")))?;

    info!(
        "Rendered study page for {} ({} units, {} bytes)",
        course.id,
        course.units.len(),
        html.len()
    );
    Ok(html)
}

/// Serialize `course` so it can sit inside a `<script>` element.
///
/// `<`, `>` and `&` are written as `\uXXXX` so the literal can never close
/// the script element, and U+2028/U+2029 are escaped because older engines
/// reject them in source text. All of these only occur inside JSON strings,
/// where the escapes decode to the same characters.
fn script_safe_json(course: &Course) -> Result<String> {
    let raw = serde_json::to_string(course)
        .map_err(|e| StudioError::Export(format!("no se pudo serializar la materia: {e}")))?;
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Read the embedded course back out of a rendered study page.
pub fn extract_embedded_course(html: &str) -> Result<Course> {
    let start = html
        .find(COURSE_DATA_MARKER)
        .ok_or_else(|| StudioError::Export("el documento no contiene una materia incrustada".to_string()))?;
    let literal = html
        .get(start + COURSE_DATA_MARKER.len()..)
        .ok_or_else(|| StudioError::Export("la materia incrustada está truncada".to_string()))?;

    // The literal is followed by `;` and the rest of the script.
    let mut stream = serde_json::Deserializer::from_str(literal).into_iter::<Course>();
    match stream.next() {
        Some(Ok(course)) => {
            debug!("Extracted embedded course {}", course.id);
            Ok(course)
        }
        Some(Err(e)) => Err(StudioError::Export(format!(
            "la materia incrustada no es válida: {e}"
        ))),
        None => Err(StudioError::Export("la materia incrustada está vacía".to_string())),
    }
}

/// `Aula_<title>.html`, every whitespace run in the title replaced by `_`.
pub fn player_file_name(course: &Course) -> String {
    format!("Aula_{}.html", underscore_whitespace(&course.title))
}

// ── Backup ─────────────────────────────────────────────────────────

/// Pretty JSON backup that [`Library::import_json`](crate::library::Library::import_json)
/// accepts.
pub fn course_backup_json(course: &Course) -> Result<String> {
    serde_json::to_string_pretty(course)
        .map_err(|e| StudioError::Export(format!("no se pudo serializar la materia: {e}")))
}

/// `Respaldo_<title>.json`.
pub fn backup_file_name(course: &Course) -> String {
    format!("Respaldo_{}.json", underscore_whitespace(&course.title))
}

fn underscore_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push('_');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

// ── Submissions ────────────────────────────────────────────────────

impl Submission {
    /// A submission stamped now, with no scores yet.
    pub fn new(
        student_name: impl Into<String>,
        student_control_number: impl Into<String>,
        lesson_title: impl Into<String>,
        activity_title: impl Into<String>,
        content: impl Into<String>,
        reflection: impl Into<String>,
    ) -> Self {
        Self {
            student_name: student_name.into(),
            student_control_number: student_control_number.into(),
            lesson_title: lesson_title.into(),
            activity_title: activity_title.into(),
            content: content.into(),
            reflection: reflection.into(),
            timestamp: Utc::now().timestamp_millis(),
            ai_score: 0.0,
            authenticity_score: 0.0,
        }
    }

    /// Copy the scores of an advisory grade onto the record.
    pub fn with_grade(mut self, grade: &Grade) -> Self {
        self.ai_score = grade.score;
        self.authenticity_score = grade.authenticity_score;
        self
    }

    /// Identity fields must be present and the reflection must reach
    /// [`MIN_REFLECTION_CHARS`] characters.
    pub fn validate(&self) -> Result<()> {
        if self.student_control_number.trim().is_empty() {
            return Err(StudioError::Validation(
                "El número de control es obligatorio.".to_string(),
            ));
        }
        if self.student_name.trim().is_empty() {
            return Err(StudioError::Validation(
                "El nombre completo es obligatorio.".to_string(),
            ));
        }
        let len = self.reflection.chars().count();
        if len < MIN_REFLECTION_CHARS {
            return Err(StudioError::Validation(format!(
                "Tu reflexión es muy corta ({len} de {MIN_REFLECTION_CHARS} caracteres). Explica mejor tu proceso."
            )));
        }
        Ok(())
    }

    /// `Entrega_<control number>.json`.
    pub fn file_name(&self) -> String {
        format!("Entrega_{}.json", self.student_control_number.trim())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StudioError::Export(format!("no se pudo serializar la entrega: {e}")))
    }
}
