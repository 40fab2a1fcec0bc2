//! Untyped model response shapes and their mapping into the course model.
//!
//! Every field is optional because the model is not bound by the schema it
//! is given. Each entity has exactly one mapping function that fills every
//! default, so the viewer never renders an empty title and the scoring
//! engine never sees a raw shape.

use rand::Rng;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::model::{
    AuthorizedStudent, Block, BlockKind, CalendarWeek, EvaluationEntry, Grade, Instrumentation,
    Lesson, Question, RubricItem, Unit, UnitAnalysis,
};

pub const DEFAULT_UNIT_SUMMARY: &str = "Contenido pendiente de desarrollo.";
pub const DEFAULT_BLOCK_TITLE: &str = "Contenido Académico";
pub const DEFAULT_BLOCK_CONTENT: &str = "Sin contenido detallado disponible.";
pub const DEFAULT_COMPETENCY: &str = "Competencia técnica profesional.";
pub const DEFAULT_SUBJECT_CODE: &str = "TEC-001";

// ── Skeleton ───────────────────────────────────────────────────────

/// Course skeleton as returned by the model.
#[derive(Deserialize, JsonSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawSkeleton {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub subject_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub instrumentation: Option<RawInstrumentation>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub units: Option<Vec<RawUnit>>,
}

#[derive(Deserialize, JsonSchema, Debug, Default)]
pub struct RawUnit {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub summary: Option<String>,
}

impl RawUnit {
    /// Map the unit at position `index`. Ids are `u<index>`; lessons start empty.
    pub fn into_unit(self, index: usize) -> Unit {
        Unit {
            id: format!("u{index}"),
            title: non_blank(self.title).unwrap_or_else(|| format!("Unidad {}", index + 1)),
            summary: non_blank(self.summary).unwrap_or_else(|| DEFAULT_UNIT_SUMMARY.to_string()),
            lessons: Vec::new(),
        }
    }
}

#[derive(Deserialize, JsonSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawInstrumentation {
    #[serde(default, deserialize_with = "lenient::string")]
    pub characterization: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub didactic_intent: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub subject_competency: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub analysis_by_unit: Option<Vec<RawUnitAnalysis>>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub evaluation_matrix: Option<Vec<RawEvaluationEntry>>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub calendar: Option<Vec<RawCalendarWeek>>,
}

#[derive(Deserialize, JsonSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawUnitAnalysis {
    #[serde(default, deserialize_with = "lenient::string")]
    pub unit_title: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub competency_description: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub indicators_of_reach: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub hours: Option<String>,
}

#[derive(Deserialize, JsonSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawEvaluationEntry {
    #[serde(default, deserialize_with = "lenient::string")]
    pub evidence: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub indicators: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub evaluation_type: Option<String>,
}

#[derive(Deserialize, JsonSchema, Debug, Default)]
pub struct RawCalendarWeek {
    #[serde(default, deserialize_with = "lenient::whole")]
    pub week: Option<u32>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub planned: Option<String>,
}

impl RawInstrumentation {
    pub fn into_instrumentation(self) -> Instrumentation {
        Instrumentation {
            characterization: self.characterization.unwrap_or_default(),
            didactic_intent: self.didactic_intent.unwrap_or_default(),
            subject_competency: self.subject_competency.unwrap_or_default(),
            analysis_by_unit: self
                .analysis_by_unit
                .unwrap_or_default()
                .into_iter()
                .map(|a| UnitAnalysis {
                    unit_title: a.unit_title.unwrap_or_default(),
                    competency_description: a.competency_description.unwrap_or_default(),
                    indicators_of_reach: a.indicators_of_reach.unwrap_or_default(),
                    hours: a.hours.unwrap_or_default(),
                })
                .collect(),
            evaluation_matrix: self
                .evaluation_matrix
                .unwrap_or_default()
                .into_iter()
                .map(|e| EvaluationEntry {
                    evidence: e.evidence.unwrap_or_default(),
                    percentage: e.percentage.unwrap_or(0.0),
                    indicators: e.indicators.unwrap_or_default(),
                    evaluation_type: e.evaluation_type.unwrap_or_default(),
                })
                .collect(),
            calendar: self
                .calendar
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .map(|(i, w)| CalendarWeek {
                    week: w.week.unwrap_or(i as u32 + 1),
                    planned: w.planned.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

// ── Unit content ───────────────────────────────────────────────────

/// Unit content as returned by the model.
#[derive(Deserialize, JsonSchema, Debug, Default)]
pub struct RawUnitContent {
    #[serde(default, deserialize_with = "lenient::list")]
    pub lessons: Option<Vec<RawLesson>>,
}

#[derive(Deserialize, JsonSchema, Debug, Default)]
pub struct RawLesson {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub blocks: Option<Vec<RawBlock>>,
}

impl RawLesson {
    /// Map the lesson at position `index`, giving it `id`.
    pub fn into_lesson(self, id: String, index: usize) -> Lesson {
        Lesson {
            id,
            title: non_blank(self.title).unwrap_or_else(|| format!("Lección {}", index + 1)),
            blocks: self
                .blocks
                .unwrap_or_default()
                .into_iter()
                .map(RawBlock::into_block)
                .collect(),
        }
    }
}

#[derive(Deserialize, JsonSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    #[serde(rename = "type", default, deserialize_with = "lenient::kind")]
    pub kind: Option<BlockKind>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub competency: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub rubric: Option<Vec<RawRubricItem>>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub test_questions: Option<Vec<RawQuestion>>,
}

impl RawBlock {
    pub fn into_block(self) -> Block {
        Block {
            kind: self.kind.unwrap_or_default(),
            title: non_blank(self.title).unwrap_or_else(|| DEFAULT_BLOCK_TITLE.to_string()),
            content: non_blank(self.content).unwrap_or_else(|| DEFAULT_BLOCK_CONTENT.to_string()),
            competency: Some(
                non_blank(self.competency).unwrap_or_else(|| DEFAULT_COMPETENCY.to_string()),
            ),
            weight: Some(self.weight.filter(|w| w.is_finite()).unwrap_or(0.0)),
            rubric: self
                .rubric
                .unwrap_or_default()
                .into_iter()
                .map(RawRubricItem::into_rubric_item)
                .collect(),
            test_questions: self
                .test_questions
                .unwrap_or_default()
                .into_iter()
                .filter_map(RawQuestion::into_question)
                .collect(),
        }
    }
}

#[derive(Deserialize, JsonSchema, Debug, Default)]
pub struct RawRubricItem {
    #[serde(default, deserialize_with = "lenient::string")]
    pub criterion: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub points: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: Option<String>,
}

impl RawRubricItem {
    pub fn into_rubric_item(self) -> RubricItem {
        RubricItem {
            criterion: non_blank(self.criterion).unwrap_or_else(|| "Criterio".to_string()),
            points: self.points.filter(|p| p.is_finite()).unwrap_or(0.0),
            description: self.description.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize, JsonSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    #[serde(default, deserialize_with = "lenient::string")]
    pub question: Option<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub options: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::whole")]
    pub correct_answer_index: Option<usize>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub feedback: Option<String>,
}

impl RawQuestion {
    /// Map a question. Questions without options, or whose correct index
    /// points past the options, cannot be answered and are dropped.
    pub fn into_question(self) -> Option<Question> {
        let options = self.options.unwrap_or_default();
        let correct = self.correct_answer_index.unwrap_or(0);
        if options.is_empty() || correct >= options.len() {
            return None;
        }
        Some(Question {
            question: non_blank(self.question).unwrap_or_else(|| "Pregunta".to_string()),
            options,
            correct_answer_index: correct,
            feedback: self.feedback.unwrap_or_default(),
        })
    }
}

// ── Grade ──────────────────────────────────────────────────────────

/// Grade as returned by the model.
#[derive(Deserialize, JsonSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawGrade {
    #[serde(default, deserialize_with = "lenient::number")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub authenticity_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub general_feedback: Option<String>,
    /// Older responses used a bare `feedback` key.
    #[schemars(skip)]
    #[serde(default, deserialize_with = "lenient::string")]
    pub feedback: Option<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub strengths: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub improvement_areas: Option<Vec<String>>,
}

impl RawGrade {
    pub fn into_grade(self) -> Grade {
        Grade {
            score: self.score.filter(|s| s.is_finite()).unwrap_or(0.0),
            authenticity_score: self
                .authenticity_score
                .filter(|s| s.is_finite())
                .unwrap_or(0.0),
            general_feedback: non_blank(self.general_feedback)
                .or_else(|| non_blank(self.feedback))
                .unwrap_or_default(),
            strengths: self.strengths.unwrap_or_default(),
            improvement_areas: self.improvement_areas.unwrap_or_default(),
        }
    }
}

// ── Student roster ─────────────────────────────────────────────────

/// Parse a pasted roster, one `<id> <full name>` per line.
///
/// Lines with fewer than two whitespace-separated tokens are skipped. Every
/// student gets a fresh 4-digit PIN.
pub fn parse_student_list(raw: &str) -> Vec<AuthorizedStudent> {
    let mut rng = rand::rng();
    raw.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let id = parts.next()?;
            let name: Vec<&str> = parts.collect();
            if name.is_empty() {
                return None;
            }
            Some(AuthorizedStudent {
                id: id.to_string(),
                name: name.join(" "),
                pin: rng.random_range(1000..=9999).to_string(),
            })
        })
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Field readers that turn a mistyped value into `None` instead of failing
/// the whole response. Numbers given as strings, strings given as numbers
/// and whole numbers written as `1.0` are all accepted.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use crate::model::BlockKind;

    fn text(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn numeric(value: &Value) -> Option<f64> {
        let n: f64 = match value {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(text(Value::deserialize(d)?))
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(numeric(&Value::deserialize(d)?))
    }

    /// Non-negative whole numbers; `2.5` and `-1` read as missing.
    pub fn whole<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u64>,
    {
        Ok(numeric(&Value::deserialize(d)?)
            .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
            .and_then(|n| T::try_from(n as u64).ok()))
    }

    /// Scalars become strings; nested arrays and objects are skipped.
    pub fn strings<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<String>>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => Some(items.into_iter().filter_map(text).collect()),
            _ => None,
        })
    }

    pub fn kind<'de, D: Deserializer<'de>>(d: D) -> Result<Option<BlockKind>, D::Error> {
        Ok(text(Value::deserialize(d)?).map(|tag| BlockKind::from_tag(&tag)))
    }

    pub fn object<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(d)? {
            value @ Value::Object(_) => serde_json::from_value(value).ok(),
            _ => None,
        })
    }

    /// Elements that are not objects keep their position as a default entry.
    pub fn list<'de, D, T>(d: D) -> Result<Option<Vec<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .map(|item| serde_json::from_value(item).unwrap_or_default())
                    .collect(),
            ),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_defaults_fill_missing_fields() {
        let unit = RawUnit::default().into_unit(2);
        assert_eq!(unit.id, "u2");
        assert_eq!(unit.title, "Unidad 3");
        assert_eq!(unit.summary, DEFAULT_UNIT_SUMMARY);
        assert!(unit.lessons.is_empty());
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let unit = RawUnit {
            title: Some("  ".into()),
            summary: Some(String::new()),
        }
        .into_unit(0);
        assert_eq!(unit.title, "Unidad 1");
        assert_eq!(unit.summary, DEFAULT_UNIT_SUMMARY);
    }

    #[test]
    fn block_defaults_fill_every_optional_field() {
        let block = RawBlock::default().into_block();
        assert_eq!(block.kind, BlockKind::Theory);
        assert_eq!(block.title, DEFAULT_BLOCK_TITLE);
        assert_eq!(block.content, DEFAULT_BLOCK_CONTENT);
        assert_eq!(block.competency.as_deref(), Some(DEFAULT_COMPETENCY));
        assert_eq!(block.weight, Some(0.0));
        assert!(block.rubric.is_empty());
    }

    #[test]
    fn lesson_mapping_from_json() {
        let raw: RawLesson = serde_json::from_str(
            r#"{"blocks":[{"type":"test","title":"Examen","testQuestions":[
                {"question":"¿Qué es un proceso?","options":["A","B"],"correctAnswerIndex":1,"feedback":"B"}
            ]}]}"#,
        )
        .unwrap();
        let lesson = raw.into_lesson("l_1_0".into(), 0);
        assert_eq!(lesson.title, "Lección 1");
        assert_eq!(lesson.blocks[0].kind, BlockKind::Test);
        assert_eq!(lesson.blocks[0].questions()[0].correct_answer_index, 1);
    }

    #[test]
    fn unanswerable_questions_dropped() {
        assert!(RawQuestion::default().into_question().is_none());
        let out_of_range = RawQuestion {
            question: Some("q".into()),
            options: Some(vec!["a".into()]),
            correct_answer_index: Some(3),
            feedback: None,
        };
        assert!(out_of_range.into_question().is_none());
    }

    #[test]
    fn grade_accepts_legacy_feedback_key() {
        let raw: RawGrade =
            serde_json::from_str(r#"{"score": 35, "feedback": "Buen trabajo"}"#).unwrap();
        let grade = raw.into_grade();
        assert_eq!(grade.score, 35.0);
        assert_eq!(grade.general_feedback, "Buen trabajo");
        assert!(grade.strengths.is_empty());
    }

    #[test]
    fn instrumentation_calendar_weeks_default_to_position() {
        let raw: RawInstrumentation =
            serde_json::from_str(r#"{"calendar":[{"planned":"Intro"},{"week":5,"planned":"X"}]}"#)
                .unwrap();
        let inst = raw.into_instrumentation();
        assert_eq!(inst.calendar[0].week, 1);
        assert_eq!(inst.calendar[1].week, 5);
    }

    #[test]
    fn mistyped_block_fields_are_coerced() {
        let raw: RawUnitContent = serde_json::from_str(
            r#"{"lessons":[{"blocks":[
                {"type":"Activity","weight":"45","rubric":[{"criterion":7,"points":"20"}]},
                {"type":"TEST","testQuestions":[
                    {"question":"q","options":["a","b",3],"correctAnswerIndex":1.0}
                ]}
            ]}]}"#,
        )
        .unwrap();
        let lesson = raw.lessons.unwrap().remove(0).into_lesson("l".into(), 0);
        let activity = &lesson.blocks[0];
        assert_eq!(activity.kind, BlockKind::Activity);
        assert_eq!(activity.weight, Some(45.0));
        assert_eq!(activity.rubric[0].criterion, "7");
        assert_eq!(activity.rubric[0].points, 20.0);

        let test = &lesson.blocks[1];
        assert_eq!(test.kind, BlockKind::Test);
        assert_eq!(test.questions()[0].options, ["a", "b", "3"]);
        assert_eq!(test.questions()[0].correct_answer_index, 1);
    }

    #[test]
    fn unusable_values_read_as_missing() {
        let raw: RawBlock = serde_json::from_str(
            r#"{"type":null,"title":["x"],"weight":"mucho","rubric":"ninguna","testQuestions":{}}"#,
        )
        .unwrap();
        let block = raw.into_block();
        assert_eq!(block.kind, BlockKind::Theory);
        assert_eq!(block.title, DEFAULT_BLOCK_TITLE);
        assert_eq!(block.weight, Some(0.0));
        assert!(block.rubric.is_empty());

        let q: RawQuestion =
            serde_json::from_str(r#"{"options":["a","b"],"correctAnswerIndex":1.5}"#).unwrap();
        assert_eq!(q.correct_answer_index, None);
    }

    #[test]
    fn mistyped_instrumentation_fields_are_coerced() {
        let raw: RawSkeleton = serde_json::from_str(
            r#"{"title":"Redes","units":["Unidad suelta",{"title":"Capas"}],
                "instrumentation":{
                    "analysisByUnit":[{"unitTitle":"U1","hours":12}],
                    "evaluationMatrix":[{"evidence":"Examen","percentage":"30%"}],
                    "calendar":[{"week":1.0,"planned":"Intro"},{"week":"3","planned":"X"}]
                }}"#,
        )
        .unwrap();
        let units = raw.units.unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].title.as_deref(), Some("Capas"));

        let inst = raw.instrumentation.unwrap().into_instrumentation();
        assert_eq!(inst.analysis_by_unit[0].hours, "12");
        assert_eq!(inst.evaluation_matrix[0].percentage, 30.0);
        assert_eq!(inst.calendar[0].week, 1);
        assert_eq!(inst.calendar[1].week, 3);
    }

    #[test]
    fn student_list_parsing() {
        let students =
            parse_student_list("21010001 Ana María López\n\n  solo\n21010002   Luis Pérez  ");
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].id, "21010001");
        assert_eq!(students[0].name, "Ana María López");
        assert_eq!(students[1].name, "Luis Pérez");
        for s in &students {
            let pin: u32 = s.pin.parse().unwrap();
            assert!((1000..=9999).contains(&pin));
        }
    }

    #[test]
    fn empty_student_list() {
        assert!(parse_student_list("").is_empty());
    }
}
