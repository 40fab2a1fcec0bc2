//! Live grade and activity point pool for a unit.
//!
//! A unit is worth 100 points: tests contribute a 0–10 grade and activities
//! share a fixed pool of 90. The split is a constant of the tool, not a
//! per-course setting. The exported study page carries its own copy of these
//! formulas and reads its constants from here.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Block, BlockKind, Question, Unit};

/// Points shared evenly by the activities of a unit.
pub const ACTIVITY_POINT_POOL: f64 = 90.0;

/// Scale of the test-derived grade.
pub const TEST_GRADE_SCALE: f64 = 10.0;

/// Title fragments that mark a block as an activity when its tag does not.
pub const ACTIVITY_TITLE_MARKERS: [&str; 2] = ["actividad", "cuadro"];

// ── Classification ─────────────────────────────────────────────────

/// Decide how a block is graded.
///
/// Rules, first match wins:
/// 1. tag `test` → [`BlockKind::Test`]
/// 2. tag `activity` → [`BlockKind::Activity`]
/// 3. title containing `actividad` or `cuadro` (any case) → [`BlockKind::Activity`]
/// 4. otherwise the tag as given
///
/// Rule 3 exists because generated content does not always tag activities.
pub fn classify_block(block: &Block) -> BlockKind {
    match block.kind {
        BlockKind::Test => BlockKind::Test,
        BlockKind::Activity => BlockKind::Activity,
        other => {
            let title = block.title.to_lowercase();
            if ACTIVITY_TITLE_MARKERS.iter().any(|m| title.contains(m)) {
                BlockKind::Activity
            } else {
                other
            }
        }
    }
}

pub fn is_activity(block: &Block) -> bool {
    classify_block(block) == BlockKind::Activity
}

pub fn is_test(block: &Block) -> bool {
    classify_block(block) == BlockKind::Test
}

// ── Activity pool ──────────────────────────────────────────────────

/// Activity count and per-activity worth for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActivityStats {
    pub count: usize,
    /// `ACTIVITY_POINT_POOL / count`, or 0 when there are no activities.
    pub points_per_activity: f64,
}

impl ActivityStats {
    /// Points actually distributed: the full pool, or 0 without activities.
    pub fn total_points(&self) -> f64 {
        self.points_per_activity * self.count as f64
    }
}

pub fn activity_stats(unit: &Unit) -> ActivityStats {
    let count = unit
        .lessons
        .iter()
        .flat_map(|l| l.blocks.iter())
        .filter(|b| is_activity(b))
        .count();
    let points_per_activity = if count == 0 {
        0.0
    } else {
        ACTIVITY_POINT_POOL / count as f64
    };
    ActivityStats {
        count,
        points_per_activity,
    }
}

// ── Test grade ─────────────────────────────────────────────────────

/// Percentage-correct results of test blocks, keyed by
/// `(lesson id, block index)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestScores(BTreeMap<(String, usize), f64>);

impl TestScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, lesson_id: &str, block_index: usize, percentage: f64) {
        self.0
            .insert((lesson_id.to_string(), block_index), percentage);
    }

    pub fn get(&self, lesson_id: &str, block_index: usize) -> Option<f64> {
        self.0.get(&(lesson_id.to_string(), block_index)).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Live 0–10 grade of a unit, rounded to one decimal.
///
/// Every test block contributes its recorded percentage, or 100 when it has
/// not been answered yet. With no test blocks the average is 100.
pub fn unit_grade(unit: &Unit, scores: &TestScores) -> f64 {
    let mut total_tests = 0usize;
    let mut total_pct = 0.0;
    for lesson in &unit.lessons {
        for (index, block) in lesson.blocks.iter().enumerate() {
            if is_test(block) {
                total_tests += 1;
                total_pct += scores.get(&lesson.id, index).unwrap_or(100.0);
            }
        }
    }
    let average = if total_tests == 0 {
        100.0
    } else {
        total_pct / total_tests as f64
    };
    round_one_decimal(average / 100.0 * TEST_GRADE_SCALE)
}

/// Round half away from zero to one decimal.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ── Single-attempt answering ───────────────────────────────────────

/// Result of answering one question.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub correct_answer_index: usize,
    pub feedback: String,
    /// Block percentage after this answer.
    pub block_percentage: f64,
}

/// Answers given within one test block. Each question locks on its first
/// answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestAttempt {
    answers: BTreeMap<usize, usize>,
    locked: BTreeSet<usize>,
}

impl TestAttempt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer question `question_index` with `option`.
    ///
    /// Returns `None` when the question is already locked or either index is
    /// out of range; the attempt is unchanged in that case.
    pub fn answer(
        &mut self,
        questions: &[Question],
        question_index: usize,
        option: usize,
    ) -> Option<AnswerFeedback> {
        let question = questions.get(question_index)?;
        if self.locked.contains(&question_index) || option >= question.options.len() {
            return None;
        }
        self.answers.insert(question_index, option);
        self.locked.insert(question_index);

        Some(AnswerFeedback {
            correct: question.is_correct(option),
            correct_answer_index: question.correct_answer_index,
            feedback: question.feedback.clone(),
            block_percentage: self.percentage(questions),
        })
    }

    /// Correct answers so far over the total number of questions, as a
    /// percentage. Unanswered questions count as wrong here; the unit grade
    /// only reads this once the block has been engaged.
    pub fn percentage(&self, questions: &[Question]) -> f64 {
        if questions.is_empty() {
            return 100.0;
        }
        let correct = self
            .answers
            .iter()
            .filter(|(q, opt)| questions.get(**q).is_some_and(|q| q.is_correct(**opt)))
            .count();
        correct as f64 / questions.len() as f64 * 100.0
    }

    pub fn is_locked(&self, question_index: usize) -> bool {
        self.locked.contains(&question_index)
    }

    pub fn selected(&self, question_index: usize) -> Option<usize> {
        self.answers.get(&question_index).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Lesson;

    fn block(kind: BlockKind, title: &str) -> Block {
        Block {
            kind,
            title: title.into(),
            content: String::new(),
            competency: None,
            weight: None,
            rubric: vec![],
            test_questions: vec![],
        }
    }

    fn questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                question: format!("P{i}"),
                options: vec!["a".into(), "b".into(), "c".into()],
                correct_answer_index: 1,
                feedback: format!("retro {i}"),
            })
            .collect()
    }

    fn test_block(n: usize) -> Block {
        let mut b = block(BlockKind::Test, "Examen");
        b.test_questions = questions(n);
        b
    }

    fn unit(blocks: Vec<Block>) -> Unit {
        Unit {
            id: "u0".into(),
            title: "U".into(),
            summary: String::new(),
            lessons: vec![Lesson {
                id: "l0".into(),
                title: "L".into(),
                blocks,
            }],
        }
    }

    #[test]
    fn classification_rules_in_order() {
        assert_eq!(classify_block(&block(BlockKind::Test, "Actividad")), BlockKind::Test);
        assert_eq!(classify_block(&block(BlockKind::Activity, "Teoría")), BlockKind::Activity);
        assert_eq!(
            classify_block(&block(BlockKind::Theory, "ACTIVIDAD integradora")),
            BlockKind::Activity
        );
        assert_eq!(
            classify_block(&block(BlockKind::Example, "Cuadro comparativo")),
            BlockKind::Activity
        );
        assert_eq!(classify_block(&block(BlockKind::Example, "Ejemplo")), BlockKind::Example);
    }

    #[test]
    fn two_activities_share_the_pool() {
        let u = unit(vec![
            block(BlockKind::Activity, "Práctica 1"),
            block(BlockKind::Theory, "Cuadro sinóptico"),
            block(BlockKind::Theory, "Teoría"),
        ]);
        let stats = activity_stats(&u);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.points_per_activity, 45.0);
        assert_eq!(unit_grade(&u, &TestScores::new()), 10.0);
    }

    #[test]
    fn pool_sums_to_ninety() {
        for n in 1..=13 {
            let u = unit((0..n).map(|_| block(BlockKind::Activity, "A")).collect());
            let stats = activity_stats(&u);
            assert!((stats.total_points() - ACTIVITY_POINT_POOL).abs() < 1e-9, "n={n}");
        }
    }

    #[test]
    fn no_activities_reports_zero() {
        let stats = activity_stats(&unit(vec![block(BlockKind::Theory, "T")]));
        assert_eq!(stats.count, 0);
        assert_eq!(stats.points_per_activity, 0.0);
        assert!(!stats.points_per_activity.is_nan());
        assert_eq!(stats.total_points(), 0.0);
    }

    #[test]
    fn three_of_four_correct_is_seven_and_a_half() {
        let u = unit(vec![test_block(4)]);
        let qs = u.lessons[0].blocks[0].questions().to_vec();
        let mut attempt = TestAttempt::new();
        attempt.answer(&qs, 0, 1).unwrap();
        attempt.answer(&qs, 1, 1).unwrap();
        attempt.answer(&qs, 2, 0).unwrap();
        let last = attempt.answer(&qs, 3, 1).unwrap();
        assert_eq!(last.block_percentage, 75.0);

        let mut scores = TestScores::new();
        scores.record("l0", 0, last.block_percentage);
        assert_eq!(unit_grade(&u, &scores), 7.5);
    }

    #[test]
    fn unanswered_tests_count_as_full_credit() {
        let u = unit(vec![test_block(2), block(BlockKind::Theory, "T"), test_block(2)]);
        assert_eq!(unit_grade(&u, &TestScores::new()), 10.0);

        let mut scores = TestScores::new();
        scores.record("l0", 0, 50.0);
        // (50 + 100) / 2 = 75 -> 7.5
        assert_eq!(unit_grade(&u, &scores), 7.5);
    }

    #[test]
    fn grade_is_non_increasing_as_tests_are_engaged() {
        let u = unit(vec![test_block(3), test_block(3), test_block(3)]);
        let mut scores = TestScores::new();
        let mut previous = unit_grade(&u, &scores);
        for (idx, pct) in [(0, 66.7), (1, 100.0), (2, 0.0)] {
            scores.record("l0", idx, pct);
            let grade = unit_grade(&u, &scores);
            assert!(grade <= previous, "{grade} > {previous}");
            previous = grade;
        }
    }

    #[test]
    fn grade_rounds_to_one_decimal() {
        let u = unit(vec![test_block(3)]);
        let mut scores = TestScores::new();
        scores.record("l0", 0, 100.0 / 3.0);
        assert_eq!(unit_grade(&u, &scores), 3.3);
    }

    #[test]
    fn answers_lock_after_first_choice() {
        let qs = questions(2);
        let mut attempt = TestAttempt::new();
        let first = attempt.answer(&qs, 0, 0).unwrap();
        assert!(!first.correct);
        assert_eq!(first.correct_answer_index, 1);
        assert_eq!(first.feedback, "retro 0");
        assert!(attempt.is_locked(0));
        assert!(attempt.answer(&qs, 0, 1).is_none());
        assert_eq!(attempt.selected(0), Some(0));
        assert_eq!(attempt.answered_count(), 1);
    }

    #[test]
    fn out_of_range_answers_rejected() {
        let qs = questions(1);
        let mut attempt = TestAttempt::new();
        assert!(attempt.answer(&qs, 5, 0).is_none());
        assert!(attempt.answer(&qs, 0, 9).is_none());
        assert!(!attempt.is_locked(0));
    }

    #[test]
    fn percentage_counts_over_all_questions() {
        let qs = questions(4);
        let mut attempt = TestAttempt::new();
        let fb = attempt.answer(&qs, 2, 1).unwrap();
        assert_eq!(fb.block_percentage, 25.0);
    }
}
