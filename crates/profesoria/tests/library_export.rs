//! Integration tests for the file-backed library, backups and the study page.

use profesoria::export::{
    course_backup_json, extract_embedded_course, player_file_name, render_player,
};
use profesoria::library::{
    INVALID_BACKUP, JsonFileStore, LIBRARY_FILE, Library, TEACHER_SESSION_FILE,
};
use profesoria::model::{
    AuthorizedStudent, Block, BlockKind, CalendarWeek, Course, Instrumentation, Lesson, Question,
    RubricItem, Unit,
};
use profesoria::scoring;
use profesoria::viewer::{BuildOutcome, ViewerState};
use profesoria::StudioError;

fn block(kind: BlockKind, title: &str) -> Block {
    Block {
        kind,
        title: title.into(),
        content: format!("Contenido de {title}"),
        competency: Some("Competencia técnica profesional.".into()),
        weight: Some(0.0),
        rubric: vec![],
        test_questions: vec![],
    }
}

fn sample_course() -> Course {
    let mut activity = block(BlockKind::Activity, "Práctica de planificación");
    activity.weight = Some(45.0);
    activity.rubric = vec![RubricItem {
        criterion: "Exactitud".into(),
        points: 45.0,
        description: "Resultados correctos".into(),
    }];

    let mut test = block(BlockKind::Test, "Evaluación");
    test.test_questions = (0..4)
        .map(|i| Question {
            question: format!("Pregunta {i}"),
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_answer_index: i % 3,
            feedback: "Revisa la lección".into(),
        })
        .collect();

    Course {
        id: "course_1718000000000".into(),
        created_at: 1_718_000_000_000,
        title: "Sistemas Operativos".into(),
        duration: "64 horas".into(),
        subject_code: "SCD-1027".into(),
        description: "Gestión de procesos, memoria y archivos.".into(),
        instrumentation: Some(Instrumentation {
            characterization: "Asignatura de base".into(),
            calendar: vec![CalendarWeek {
                week: 1,
                planned: "Encuadre".into(),
            }],
            ..Default::default()
        }),
        units: vec![
            Unit {
                id: "u0".into(),
                title: "Procesos".into(),
                summary: "Ciclo de vida".into(),
                lessons: vec![Lesson {
                    id: "l_1_0".into(),
                    title: "Planificación".into(),
                    blocks: vec![
                        block(BlockKind::Theory, "Conceptos"),
                        activity,
                        block(BlockKind::Example, "Cuadro comparativo de algoritmos"),
                        test,
                    ],
                }],
            },
            Unit {
                id: "u1".into(),
                title: "Memoria".into(),
                summary: "Paginación".into(),
                lessons: vec![],
            },
        ],
        final_projects: vec![],
        student_list: vec![AuthorizedStudent {
            id: "L001".into(),
            name: "Ana Pérez".into(),
            pin: "4821".into(),
        }],
    }
}

// ── Persistence ──────────────────────────────────────────────────────

#[test]
fn library_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut lib = Library::open(JsonFileStore::new(dir.path()).unwrap()).unwrap();
        lib.add(sample_course()).unwrap();
        lib.login("T-042").unwrap();
    }
    assert!(dir.path().join(LIBRARY_FILE).exists());
    assert!(dir.path().join(TEACHER_SESSION_FILE).exists());

    let lib = Library::open(JsonFileStore::new(dir.path()).unwrap()).unwrap();
    assert_eq!(lib.courses(), &[sample_course()]);
    assert_eq!(lib.teacher().unwrap().id, "T-042");
}

#[test]
fn logout_removes_session_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut lib = Library::open(JsonFileStore::new(dir.path()).unwrap()).unwrap();
    lib.login("T-042").unwrap();
    lib.logout().unwrap();
    assert!(!dir.path().join(TEACHER_SESSION_FILE).exists());
    // Logging out twice is harmless.
    lib.logout().unwrap();
}

#[test]
fn malformed_library_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(LIBRARY_FILE), "{ not json").unwrap();
    std::fs::write(dir.path().join(TEACHER_SESSION_FILE), "[]").unwrap();
    let lib = Library::open(JsonFileStore::new(dir.path()).unwrap()).unwrap();
    assert!(lib.courses().is_empty());
    assert!(lib.teacher().is_none());
}

fn corrupt_copies(dir: &std::path::Path, file: &str) -> Vec<std::path::PathBuf> {
    let prefix = format!("{file}.corrupt-");
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix))
        })
        .collect()
}

#[test]
fn malformed_library_survives_later_add() {
    let dir = tempfile::tempdir().unwrap();
    // The second course has a question without `correctAnswerIndex`.
    let legacy = r#"[
        {"id": "keep_me", "title": "Redes", "units": []},
        {"id": "legacy", "title": "Viejo", "units": [
            {"id": "u0", "title": "U", "summary": "", "lessons": [
                {"id": "l0", "title": "L", "blocks": [
                    {"type": "test", "title": "T", "content": "",
                     "testQuestions": [{"question": "q", "options": ["a"]}]}
                ]}
            ]}
        ]}
    ]"#;
    std::fs::write(dir.path().join(LIBRARY_FILE), legacy).unwrap();

    let mut lib = Library::open(JsonFileStore::new(dir.path()).unwrap()).unwrap();
    assert!(lib.courses().is_empty());
    lib.add(sample_course()).unwrap();

    let copies = corrupt_copies(dir.path(), LIBRARY_FILE);
    assert_eq!(copies.len(), 1);
    assert_eq!(std::fs::read_to_string(&copies[0]).unwrap(), legacy);

    let reopened = Library::open(JsonFileStore::new(dir.path()).unwrap()).unwrap();
    assert_eq!(reopened.courses(), &[sample_course()]);
}

#[test]
fn rejected_import_leaves_saved_collection_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut lib = Library::open(JsonFileStore::new(dir.path()).unwrap()).unwrap();
    lib.add(sample_course()).unwrap();
    let before = std::fs::read_to_string(dir.path().join(LIBRARY_FILE)).unwrap();

    let err = lib.import_json(r#"{"title": "X"}"#).unwrap_err();
    assert!(matches!(err, StudioError::Validation(_)));
    assert_eq!(err.user_message(), INVALID_BACKUP);

    assert_eq!(lib.courses().len(), 1);
    let after = std::fs::read_to_string(dir.path().join(LIBRARY_FILE)).unwrap();
    assert_eq!(before, after);
}

// ── Backups and import ───────────────────────────────────────────────

#[test]
fn reimporting_backup_differs_only_in_id() {
    let dir = tempfile::tempdir().unwrap();
    let mut lib = Library::open(JsonFileStore::new(dir.path()).unwrap()).unwrap();
    let original = sample_course();

    let backup = course_backup_json(&original).unwrap();
    let first = lib.import_json(&backup).unwrap();
    let second = lib.import_json(&backup).unwrap();

    assert_ne!(first.id, original.id);
    assert!(first.id.starts_with("imported_"));
    assert_eq!(
        Course {
            id: original.id.clone(),
            ..first.clone()
        },
        original
    );
    assert_eq!(
        Course {
            id: original.id.clone(),
            ..second.clone()
        },
        original
    );
    assert_eq!(lib.courses()[0].id, second.id);
    assert_eq!(lib.courses()[1].id, first.id);
}

#[test]
fn import_accepts_browser_backup_without_optional_fields() {
    let dir = tempfile::tempdir().unwrap();
    let mut lib = Library::open(JsonFileStore::new(dir.path()).unwrap()).unwrap();
    let course = lib
        .import_json(
            r#"{"id": "course_1", "title": "Redes", "units": [
                {"id": "u0", "title": "Modelo OSI", "summary": "Capas", "lessons": [
                    {"id": "l_1_0", "title": "Capas", "blocks": [
                        {"type": "quiz", "title": "Repaso", "content": "..."}
                    ]}
                ]}
            ]}"#,
        )
        .unwrap();
    assert_eq!(course.duration, "64 horas");
    assert!(course.student_list.is_empty());
    assert_eq!(course.units[0].lessons[0].blocks[0].kind, BlockKind::Theory);
}

// ── Study page ───────────────────────────────────────────────────────

#[test]
fn study_page_round_trips_course() {
    let original = sample_course();
    let html = render_player(&original).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert_eq!(extract_embedded_course(&html).unwrap(), original);
    assert_eq!(player_file_name(&original), "Aula_Sistemas_Operativos.html");
}

#[test]
fn study_page_survives_script_breaking_text() {
    let mut course = sample_course();
    course.title = "</script><script>alert(1)</script>".into();
    course.units[0].summary = "línea\u{2029}párrafo & más".into();

    let html = render_player(&course).unwrap();
    assert_eq!(html.matches("</script>").count(), 2);
    assert_eq!(extract_embedded_course(&html).unwrap(), course);
}

#[test]
fn study_page_uses_scoring_constants() {
    let html = render_player(&sample_course()).unwrap();
    assert!(html.contains(&format!(
        "const ACTIVITY_POINT_POOL = {:?};",
        scoring::ACTIVITY_POINT_POOL
    )));
    assert!(html.contains(&format!(
        "const TEST_GRADE_SCALE = {:?};",
        scoring::TEST_GRADE_SCALE
    )));
}

// ── Viewer over a persisted library ─────────────────────────────────

#[test]
fn built_unit_is_persisted_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let course = sample_course();
    let mut lib = Library::open(JsonFileStore::new(dir.path()).unwrap()).unwrap();
    lib.add(course.clone()).unwrap();

    let mut viewer = ViewerState::new(&course);
    let ticket = viewer.begin_unit_build(&course, 1).unwrap();
    let lessons = vec![Lesson {
        id: "l_2_0".into(),
        title: "Paginación".into(),
        blocks: vec![block(BlockKind::Activity, "Actividad de paginación")],
    }];
    let outcome = viewer.finish_unit_build(&ticket, lessons, &mut lib).unwrap();
    assert_eq!(outcome, BuildOutcome::Applied);

    let reopened = Library::open(JsonFileStore::new(dir.path()).unwrap()).unwrap();
    let stored = reopened.get(&course.id).unwrap();
    assert_eq!(stored.built_unit_count(), 2);
    assert_eq!(stored.unit("u1").unwrap().lessons[0].id, "l_2_0");
}

#[test]
fn viewer_grades_sample_unit() {
    let course = sample_course();
    let mut viewer = ViewerState::new(&course);

    let stats = viewer.activity_stats(&course);
    assert_eq!(stats.count, 2);
    assert_eq!(stats.points_per_activity, 45.0);
    assert!((stats.total_points() - scoring::ACTIVITY_POINT_POOL).abs() < 1e-9);

    // Correct answers are 0, 1, 2, 0; miss the last one.
    for (q, option) in [(0, 0), (1, 1), (2, 2), (3, 1)] {
        viewer.answer(&course, "l_1_0", 3, q, option).unwrap();
    }
    assert_eq!(viewer.live_grade(&course), 7.5);
}
