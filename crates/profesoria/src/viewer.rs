//! Viewer state for one open course.
//!
//! Holds what the authoring view tracks while a teacher studies a course:
//! the active unit and lesson, completed lessons, answers to test blocks and
//! the resulting live grade. It never owns the course; every query takes the
//! current [`Course`] so the library stays the single source of truth.
//!
//! Unit builds are asynchronous and cannot be cancelled. A build is started
//! with [`ViewerState::begin_unit_build`], which hands out a [`BuildTicket`]
//! keyed by course id, unit id and a generation token. When the lessons come
//! back, [`ViewerState::finish_unit_build`] applies them by unit id only if
//! the ticket is still the outstanding one and its target still exists.
//! Moving between units or lessons while a build is in flight does not make
//! it stale; opening another course or abandoning the build does.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::library::{CourseStore, Library};
use crate::model::{Course, Lesson, Unit};
use crate::scoring::{self, ActivityStats, AnswerFeedback, TestAttempt, TestScores};

/// Handle for one in-flight unit build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTicket {
    pub course_id: String,
    pub unit_id: String,
    token: u64,
}

impl BuildTicket {
    pub fn token(&self) -> u64 {
        self.token
    }
}

/// What happened to a finished build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The lessons were stored in the unit the ticket names.
    Applied,
    /// The ticket was no longer outstanding; the lessons were dropped.
    Stale,
    /// The course or unit no longer exists; the lessons were dropped.
    TargetMissing,
}

/// Selection, progress and test state for one course.
#[derive(Debug, Clone, Default)]
pub struct ViewerState {
    course_id: String,
    unit_index: usize,
    lesson_index: usize,
    completed: BTreeSet<String>,
    attempts: BTreeMap<(String, usize), TestAttempt>,
    scores: TestScores,
    generation: u64,
    building: Option<BuildTicket>,
}

impl ViewerState {
    /// Open `course` at its first unit and lesson.
    pub fn new(course: &Course) -> Self {
        Self {
            course_id: course.id.clone(),
            ..Default::default()
        }
    }

    /// Switch to another course. Progress is reset and any outstanding build
    /// becomes stale.
    pub fn open(&mut self, course: &Course) {
        if let Some(ticket) = self.building.take() {
            debug!("Build of {} detached by opening {}", ticket.unit_id, course.id);
        }
        let generation = self.generation + 1;
        *self = Self {
            course_id: course.id.clone(),
            generation,
            ..Default::default()
        };
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    // ── Selection ──────────────────────────────────────────────────

    pub fn unit_index(&self) -> usize {
        self.unit_index
    }

    pub fn lesson_index(&self) -> usize {
        self.lesson_index
    }

    /// Select a unit; the lesson selection goes back to the first lesson.
    /// Returns `false` when the index is out of range.
    pub fn select_unit(&mut self, course: &Course, unit_index: usize) -> bool {
        if unit_index >= course.units.len() {
            return false;
        }
        self.unit_index = unit_index;
        self.lesson_index = 0;
        true
    }

    /// Select a lesson of the active unit.
    pub fn select_lesson(&mut self, course: &Course, lesson_index: usize) -> bool {
        let in_range = self
            .active_unit(course)
            .is_some_and(|u| lesson_index < u.lessons.len());
        if in_range {
            self.lesson_index = lesson_index;
        }
        in_range
    }

    /// The active unit, falling back to the first one when the stored index
    /// no longer exists.
    pub fn active_unit<'c>(&self, course: &'c Course) -> Option<&'c Unit> {
        course
            .units
            .get(self.unit_index)
            .or_else(|| course.units.first())
    }

    pub fn active_lesson<'c>(&self, course: &'c Course) -> Option<&'c Lesson> {
        self.active_unit(course)?.lessons.get(self.lesson_index)
    }

    // ── Progress ───────────────────────────────────────────────────

    /// Flip the completion mark of a lesson; returns the new state.
    pub fn toggle_lesson_complete(&mut self, lesson_id: &str) -> bool {
        if self.completed.remove(lesson_id) {
            false
        } else {
            self.completed.insert(lesson_id.to_string());
            true
        }
    }

    pub fn is_lesson_complete(&self, lesson_id: &str) -> bool {
        self.completed.contains(lesson_id)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    // ── Tests and grade ────────────────────────────────────────────

    /// Answer one question of a test block.
    ///
    /// Returns `None` when the lesson or block does not exist, the block is
    /// not a test, the question is already locked, or an index is out of
    /// range. Otherwise the block's percentage is recomputed and recorded.
    pub fn answer(
        &mut self,
        course: &Course,
        lesson_id: &str,
        block_index: usize,
        question_index: usize,
        option: usize,
    ) -> Option<AnswerFeedback> {
        let lesson = course
            .units
            .iter()
            .flat_map(|u| u.lessons.iter())
            .find(|l| l.id == lesson_id)?;
        let block = lesson.blocks.get(block_index)?;
        if !scoring::is_test(block) {
            return None;
        }

        let attempt = self
            .attempts
            .entry((lesson_id.to_string(), block_index))
            .or_default();
        let feedback = attempt.answer(block.questions(), question_index, option)?;
        self.scores
            .record(lesson_id, block_index, feedback.block_percentage);
        debug!(
            "Answered {lesson_id}#{block_index} q{question_index}: correct={}, block={:.1}%",
            feedback.correct, feedback.block_percentage
        );
        Some(feedback)
    }

    pub fn attempt(&self, lesson_id: &str, block_index: usize) -> Option<&TestAttempt> {
        self.attempts.get(&(lesson_id.to_string(), block_index))
    }

    pub fn scores(&self) -> &TestScores {
        &self.scores
    }

    /// Live 0–10 grade of the active unit; 0 when the course has no units.
    pub fn live_grade(&self, course: &Course) -> f64 {
        self.active_unit(course)
            .map_or(0.0, |u| scoring::unit_grade(u, &self.scores))
    }

    /// Activity pool split for the active unit.
    pub fn activity_stats(&self, course: &Course) -> ActivityStats {
        self.active_unit(course)
            .map(scoring::activity_stats)
            .unwrap_or_default()
    }

    // ── Unit builds ────────────────────────────────────────────────

    pub fn is_building(&self) -> bool {
        self.building.is_some()
    }

    /// Start building the unit at `unit_index`.
    ///
    /// Returns `None` while another build is outstanding or when the index is
    /// out of range.
    pub fn begin_unit_build(&mut self, course: &Course, unit_index: usize) -> Option<BuildTicket> {
        if let Some(current) = &self.building {
            debug!("Build of {} already in flight", current.unit_id);
            return None;
        }
        let unit = course.units.get(unit_index)?;
        self.generation += 1;
        let ticket = BuildTicket {
            course_id: course.id.clone(),
            unit_id: unit.id.clone(),
            token: self.generation,
        };
        info!("Building unit {} of course {}", ticket.unit_id, ticket.course_id);
        self.building = Some(ticket.clone());
        Some(ticket)
    }

    /// Apply the lessons of a finished build and persist the course.
    ///
    /// The lessons go to the unit whose id the ticket carries, wherever that
    /// unit now sits in the course. When the applied unit is the active one,
    /// the lesson selection returns to the first lesson.
    pub fn finish_unit_build<S: CourseStore>(
        &mut self,
        ticket: &BuildTicket,
        lessons: Vec<Lesson>,
        library: &mut Library<S>,
    ) -> Result<BuildOutcome> {
        if self.building.as_ref() != Some(ticket) {
            warn!(
                "Discarding stale build of unit {} in course {}",
                ticket.unit_id, ticket.course_id
            );
            return Ok(BuildOutcome::Stale);
        }
        self.building = None;

        let Some(mut course) = library.get(&ticket.course_id).cloned() else {
            warn!("Discarding build: course {} no longer exists", ticket.course_id);
            return Ok(BuildOutcome::TargetMissing);
        };
        let Some(unit) = course.unit_mut(&ticket.unit_id) else {
            warn!(
                "Discarding build: unit {} no longer exists in {}",
                ticket.unit_id, ticket.course_id
            );
            return Ok(BuildOutcome::TargetMissing);
        };
        unit.lessons = lessons;
        let lesson_count = unit.lessons.len();

        if !library.update(course.clone())? {
            return Ok(BuildOutcome::TargetMissing);
        }
        if self.course_id == course.id
            && self
                .active_unit(&course)
                .is_some_and(|u| u.id == ticket.unit_id)
        {
            self.lesson_index = 0;
        }
        info!(
            "Unit {} of {} updated with {lesson_count} lessons",
            ticket.unit_id, ticket.course_id
        );
        Ok(BuildOutcome::Applied)
    }

    /// Release the outstanding build after its generation failed.
    pub fn abandon_unit_build(&mut self, ticket: &BuildTicket) {
        if self.building.as_ref() == Some(ticket) {
            debug!("Build of {} abandoned", ticket.unit_id);
            self.building = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::MemoryStore;
    use crate::model::{Block, BlockKind, Question};

    fn question(correct: usize) -> Question {
        Question {
            question: "¿?".into(),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_answer_index: correct,
            feedback: "porque sí".into(),
        }
    }

    fn test_block(n: usize) -> Block {
        Block {
            kind: BlockKind::Test,
            title: "Evaluación".into(),
            content: String::new(),
            competency: None,
            weight: None,
            rubric: vec![],
            test_questions: (0..n).map(|_| question(0)).collect(),
        }
    }

    fn unit(id: &str, lessons: Vec<Lesson>) -> Unit {
        Unit {
            id: id.into(),
            title: format!("Unidad {id}"),
            summary: String::new(),
            lessons,
        }
    }

    fn course() -> Course {
        Course {
            id: "c1".into(),
            created_at: 0,
            title: "Curso".into(),
            duration: "64 horas".into(),
            subject_code: "TEC-001".into(),
            description: String::new(),
            instrumentation: None,
            units: vec![
                unit(
                    "u0",
                    vec![Lesson {
                        id: "l0".into(),
                        title: "Lección 1".into(),
                        blocks: vec![test_block(4)],
                    }],
                ),
                unit("u1", vec![]),
            ],
            final_projects: vec![],
            student_list: vec![],
        }
    }

    fn built_lessons() -> Vec<Lesson> {
        vec![Lesson {
            id: "l_new".into(),
            title: "Nueva".into(),
            blocks: vec![],
        }]
    }

    #[test]
    fn answering_three_of_four_gives_seven_and_a_half() {
        let course = course();
        let mut viewer = ViewerState::new(&course);
        assert_eq!(viewer.live_grade(&course), 10.0);
        for q in 0..3 {
            assert!(viewer.answer(&course, "l0", 0, q, 0).unwrap().correct);
        }
        let last = viewer.answer(&course, "l0", 0, 3, 2).unwrap();
        assert!(!last.correct);
        assert_eq!(last.block_percentage, 75.0);
        assert_eq!(viewer.live_grade(&course), 7.5);
    }

    #[test]
    fn answered_question_stays_locked() {
        let course = course();
        let mut viewer = ViewerState::new(&course);
        viewer.answer(&course, "l0", 0, 0, 1).unwrap();
        assert!(viewer.answer(&course, "l0", 0, 0, 0).is_none());
        assert_eq!(viewer.attempt("l0", 0).unwrap().selected(0), Some(1));
        assert!(viewer.answer(&course, "missing", 0, 0, 0).is_none());
    }

    #[test]
    fn selection_and_completion() {
        let course = course();
        let mut viewer = ViewerState::new(&course);
        assert!(viewer.select_unit(&course, 1));
        assert!(!viewer.select_lesson(&course, 0));
        assert!(!viewer.select_unit(&course, 9));
        assert_eq!(viewer.active_unit(&course).unwrap().id, "u1");
        assert!(viewer.toggle_lesson_complete("l0"));
        assert!(viewer.is_lesson_complete("l0"));
        assert!(!viewer.toggle_lesson_complete("l0"));
        assert_eq!(viewer.completed_count(), 0);
    }

    #[test]
    fn only_one_build_at_a_time() {
        let course = course();
        let mut viewer = ViewerState::new(&course);
        let ticket = viewer.begin_unit_build(&course, 1).unwrap();
        assert!(viewer.begin_unit_build(&course, 0).is_none());
        viewer.abandon_unit_build(&ticket);
        assert!(!viewer.is_building());
        assert!(viewer.begin_unit_build(&course, 0).is_some());
    }

    #[test]
    fn build_applies_by_unit_id_after_navigation() {
        let course = course();
        let mut library = Library::open(MemoryStore::with_courses(vec![course.clone()])).unwrap();
        let mut viewer = ViewerState::new(&course);

        let ticket = viewer.begin_unit_build(&course, 1).unwrap();
        viewer.select_unit(&course, 0);

        let outcome = viewer
            .finish_unit_build(&ticket, built_lessons(), &mut library)
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Applied);
        let stored = library.get("c1").unwrap();
        assert!(stored.unit("u1").unwrap().is_built());
        assert_eq!(stored.unit("u0").unwrap().lessons[0].id, "l0");
        assert!(!viewer.is_building());
    }

    #[test]
    fn build_after_opening_another_course_is_stale() {
        let course = course();
        let mut library = Library::open(MemoryStore::with_courses(vec![course.clone()])).unwrap();
        let mut viewer = ViewerState::new(&course);
        let ticket = viewer.begin_unit_build(&course, 1).unwrap();

        let other = Course {
            id: "c2".into(),
            ..course.clone()
        };
        viewer.open(&other);

        let outcome = viewer
            .finish_unit_build(&ticket, built_lessons(), &mut library)
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Stale);
        assert!(!library.get("c1").unwrap().unit("u1").unwrap().is_built());
        assert_eq!(library.store().writes, 0);
    }

    #[test]
    fn build_for_removed_unit_is_target_missing() {
        let course = course();
        let mut trimmed = course.clone();
        trimmed.units.truncate(1);
        let mut library = Library::open(MemoryStore::with_courses(vec![trimmed])).unwrap();
        let mut viewer = ViewerState::new(&course);
        let ticket = viewer.begin_unit_build(&course, 1).unwrap();

        let outcome = viewer
            .finish_unit_build(&ticket, built_lessons(), &mut library)
            .unwrap();
        assert_eq!(outcome, BuildOutcome::TargetMissing);
        assert!(!viewer.is_building());
    }
}
