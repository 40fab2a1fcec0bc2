//! The three instruction templates: course skeleton, unit content, grading.
//!
//! Pure functions of their inputs. Every piece of teacher-supplied free text
//! is interpolated verbatim.

use super::builder::{InstructionBuilder, UNSPECIFIED};
use crate::model::{RubricItem, UserPreferences};
use crate::scoring::{ACTIVITY_POINT_POOL, TEST_GRADE_SCALE};

/// Lower bound on units when no official syllabus fixes the count.
pub const MIN_UNITS: usize = 4;
/// Upper bound on units when no official syllabus fixes the count.
pub const MAX_UNITS: usize = 8;
/// Lessons requested per unit.
pub const LESSONS_PER_UNIT: usize = 2;

const LANGUAGE_RULE: &str = "Redacta absolutamente todo el contenido en español.";

/// Instructions for generating the course skeleton.
pub fn skeleton_prompt(prefs: &UserPreferences) -> String {
    InstructionBuilder::new(format!(
        "Actúa como un Auditor de Programas Académicos del TecNM de alto nivel.\n\
         Tu misión es diseñar la estructura completa de la materia: \"{}\".",
        prefs.topic
    ))
    .rules(
        "REGLAS DE RIGOR INSTITUCIONAL",
        [
            format!(
                "UNIDADES INDEPENDIENTES: No combines temas. Si el programa oficial tiene N \
                 unidades, genera exactamente N. Si no existe programa oficial, genera entre \
                 {MIN_UNITS} y {MAX_UNITS} unidades."
            ),
            "COMPETENCIAS PROFESIONALES: Redacta la competencia de la asignatura usando verbos \
             de desempeño (Saber hacer)."
                .to_string(),
            "INSTRUMENTACIÓN DIDÁCTICA: Completa todos los campos técnicos (Caracterización, \
             Intención Didáctica, análisis por unidad, matriz de evaluación y calendario) con \
             lenguaje académico de ingeniería."
                .to_string(),
            "COBERTURA: Cada unidad debe incluir \"title\" y \"summary\" no vacíos; el curso debe \
             incluir \"title\", \"subjectCode\" y \"description\"."
                .to_string(),
            LANGUAGE_RULE.to_string(),
        ],
    )
    .fields(
        "CONTEXTO",
        [
            ("Materia", prefs.topic.as_str()),
            ("Nivel", prefs.level.as_str()),
            ("Carrera", prefs.profile.as_str()),
            ("Formato", prefs.format.as_str()),
        ],
    )
    .section("SALIDA", "JSON puro siguiendo el esquema definido.")
    .build()
}

/// Instructions for generating the lessons of one unit.
pub fn unit_content_prompt(unit_title: &str, unit_summary: &str, level: &str) -> String {
    InstructionBuilder::new(format!(
        "Como experto en Ingeniería Superior, desarrolla el contenido técnico exhaustivo para: \
         \"{unit_title}\"."
    ))
    .fields(
        "UNIDAD",
        [("Título", unit_title), ("Resumen", unit_summary), ("Nivel", level)],
    )
    .rules(
        "ESTRUCTURA REQUERIDA",
        [
            format!("Genera {LESSONS_PER_UNIT} lecciones profundas."),
            "Cada lección debe tener \"title\" y una lista \"blocks\"; cada bloque debe tener \
             \"type\" (theory, example, activity o test), \"title\" y \"content\" no vacíos."
                .to_string(),
            "Incluye bloques de teoría técnica, ejemplos matemáticos o de diseño, y al menos una \
             actividad práctica de alta exigencia con \"type\": \"activity\"."
                .to_string(),
            format!(
                "Las actividades de la unidad se reparten {ACTIVITY_POINT_POOL} puntos en partes \
                 iguales; asigna a cada actividad un \"weight\" igual a su parte."
            ),
            "Cada actividad lleva una \"rubric\" con criterios cuyo \"points\" sume exactamente su \
             \"weight\"; cada criterio incluye \"criterion\", \"points\" y \"description\"."
                .to_string(),
            format!(
                "El examen (\"type\": \"test\") vale {TEST_GRADE_SCALE} puntos, debe evaluar \
                 razonamiento crítico y no solo memoria; cada pregunta incluye \"question\", \
                 \"options\", \"correctAnswerIndex\" (base cero) y \"feedback\"."
            ),
            format!("Usa terminología avanzada acorde al nivel {level}."),
            LANGUAGE_RULE.to_string(),
        ],
    )
    .section(
        "ESTILO",
        "Evita introducciones innecesarias. Ve directo al contenido técnico.",
    )
    .build()
}

/// Instructions for grading a student submission against a rubric.
///
/// The rubric is embedded as literal JSON.
pub fn grading_prompt(
    submission: &str,
    rubric: &[RubricItem],
    lesson_title: &str,
    context: &str,
) -> String {
    let rubric_json = serde_json::to_string(rubric).unwrap_or_else(|_| "[]".to_string());

    InstructionBuilder::new(format!(
        "Actúa como un profesor del TecNM. Califica esta tarea de {lesson_title}."
    ))
    .section("RÚBRICA", rubric_json)
    .section_if(!context.trim().is_empty(), "CONTEXTO DE LA LECCIÓN", || {
        context.to_string()
    })
    .section(
        "ENTREGA DEL ALUMNO",
        if submission.trim().is_empty() {
            UNSPECIFIED
        } else {
            submission
        },
    )
    .rules(
        "CRITERIOS",
        [
            "\"score\" es la suma de los puntos obtenidos por criterio, sin exceder la suma de \
             la rúbrica.",
            "\"authenticityScore\" va de 0 a 100 e indica qué tan propia parece la redacción.",
            "Incluye \"generalFeedback\", \"strengths\" e \"improvementAreas\".",
            LANGUAGE_RULE,
        ],
    )
    .section("SALIDA", "JSON puro siguiendo el esquema definido.")
    .build()
}
