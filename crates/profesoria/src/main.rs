//! Course authoring from the command line.
//!
//! Every action of the authoring view is a subcommand working on the local
//! library (`--data-dir`, default `.profesoria`). Model-backed commands read
//! the credential from `OPENROUTER_KEY` at call time.
//!
//! # Examples
//!
//! ```sh
//! profesoria login T-042
//! profesoria generate --topic "Sistemas Operativos" --level Licenciatura --students alumnos.txt
//! profesoria build-unit course_1718000000000 0
//! profesoria score course_1718000000000 --unit 0 --answers respuestas.json
//! profesoria export-html course_1718000000000 --out dist/
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use profesoria::config::StudioConfig;
use profesoria::export::{backup_file_name, course_backup_json, player_file_name, render_player};
use profesoria::library::{CourseStore, JsonFileStore, Library};
use profesoria::model::{BlockKind, Course, Submission, UserPreferences};
use profesoria::scoring::{self, ACTIVITY_POINT_POOL, TEST_GRADE_SCALE};
use profesoria::service::CourseGenerator;
use profesoria::viewer::{BuildOutcome, ViewerState};
use profesoria::{OpenRouterClient, Result, StudioError};

/// Course authoring with generated skeletons, unit lessons and a standalone study page.
#[derive(Parser)]
#[command(name = "profesoria", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    // ── Storage ──

    /// Directory holding the library and the teacher session.
    #[arg(long, global = true, env = "PROFESORIA_DATA_DIR", default_value = ".profesoria")]
    data_dir: PathBuf,

    // ── Model ──

    /// Model used for every generation call.
    #[arg(long, global = true, env = "PROFESORIA_MODEL", default_value = profesoria::config::DEFAULT_MODEL)]
    model: String,

    /// Maximum tokens per response.
    #[arg(long, global = true, default_value_t = 16384)]
    max_tokens: u32,

    /// Sampling temperature.
    #[arg(long, global = true, default_value_t = 0.4)]
    temperature: f32,

    /// HTTP timeout for one round trip, in seconds.
    #[arg(long, global = true, default_value_t = 120)]
    timeout_secs: u64,

    /// Environment variable holding the credential.
    #[arg(long, global = true, default_value = profesoria::config::DEFAULT_API_KEY_VAR)]
    api_key_var: String,

    // ── Output ──

    /// Log at debug level (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start a teacher session.
    Login { teacher_id: String },
    /// End the teacher session.
    Logout,
    /// Show the teacher session.
    Whoami,
    /// List saved courses, newest first.
    List,
    /// Print the outline of a course.
    Show { course_id: String },
    /// Generate a new course skeleton and save it.
    Generate {
        #[arg(long)]
        topic: String,
        #[arg(long, default_value = "")]
        level: String,
        /// Graduate profile the course serves.
        #[arg(long, default_value = "")]
        profile: String,
        /// Delivery format (presencial, en línea, mixto...).
        #[arg(long, default_value = "")]
        format: String,
        /// Roster file, one `<id> <full name>` per line.
        #[arg(long)]
        students: Option<PathBuf>,
        /// Save a placeholder course when generation fails.
        #[arg(long)]
        fallback: bool,
    },
    /// Generate the lessons of one unit.
    BuildUnit {
        course_id: String,
        unit_index: usize,
        /// Level passed to the model. Default: `Ingeniería Superior`.
        #[arg(long)]
        level: Option<String>,
    },
    /// Grade a student answer against an activity's rubric.
    Grade {
        course_id: String,
        lesson_id: String,
        block_index: usize,
        /// File with the student's answer.
        #[arg(long)]
        file: PathBuf,
    },
    /// Replay test answers and print the live grade of a unit.
    Score {
        course_id: String,
        #[arg(long, default_value_t = 0)]
        unit: usize,
        /// JSON array of `{"lesson", "block", "question", "option"}`.
        #[arg(long)]
        answers: Option<PathBuf>,
    },
    /// Import a course backup.
    Import { file: PathBuf },
    /// Write the standalone study page of a course.
    ExportHtml {
        course_id: String,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Write a JSON backup of a course.
    ExportJson {
        course_id: String,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Write a student submission record.
    Submission {
        #[arg(long)]
        name: String,
        #[arg(long)]
        control: String,
        #[arg(long)]
        lesson: String,
        #[arg(long)]
        activity: String,
        /// File with the activity answer.
        #[arg(long)]
        content: PathBuf,
        #[arg(long)]
        reflection: String,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

/// One answer in a replay file.
#[derive(Deserialize)]
struct ReplayAnswer {
    lesson: String,
    block: usize,
    question: usize,
    option: usize,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("profesoria=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("profesoria=info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        warn!("{e}");
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = StudioConfig {
        model: cli.model,
        max_tokens: cli.max_tokens,
        temperature: cli.temperature,
        timeout: Duration::from_secs(cli.timeout_secs),
        data_dir: cli.data_dir,
        api_key_var: cli.api_key_var,
        ..Default::default()
    };
    let mut library = Library::open(JsonFileStore::new(&config.data_dir)?)?;

    match cli.command {
        Command::Login { teacher_id } => {
            let profile = library.login(&teacher_id)?;
            println!("Sesión iniciada: {} ({})", profile.name, profile.id);
        }
        Command::Logout => {
            library.logout()?;
            println!("Sesión cerrada.");
        }
        Command::Whoami => match library.teacher() {
            Some(t) => println!("{} ({}) rol={}", t.name, t.id, t.role),
            None => println!("Sin sesión."),
        },
        Command::List => {
            for course in library.courses() {
                println!(
                    "{}\t{}\t{}\t{}/{} unidades",
                    course.id,
                    course.subject_code,
                    course.title,
                    course.built_unit_count(),
                    course.units.len()
                );
            }
        }
        Command::Show { course_id } => {
            let course = find_course(&library, &course_id)?;
            print_outline(course);
        }
        Command::Generate {
            topic,
            level,
            profile,
            format,
            students,
            fallback,
        } => {
            let student_list_raw = match students {
                Some(path) => read_text(&path)?,
                None => String::new(),
            };
            let prefs = UserPreferences {
                topic,
                level,
                profile,
                format,
                student_list_raw,
            };
            let generator = generator(&config)?;
            let course = if fallback {
                let (course, error) = generator.generate_course_skeleton_or_fallback(&prefs).await?;
                if let Some(e) = error {
                    eprintln!("{}", e.user_message());
                    eprintln!("Se generó un temario de emergencia.");
                }
                course
            } else {
                generator.generate_course_skeleton(&prefs).await?
            };
            let id = course.id.clone();
            library.add(course)?;
            println!("{id}");
        }
        Command::BuildUnit {
            course_id,
            unit_index,
            level,
        } => {
            let course = find_course(&library, &course_id)?.clone();
            let mut viewer = ViewerState::new(&course);
            let ticket = viewer.begin_unit_build(&course, unit_index).ok_or_else(|| {
                StudioError::Validation(format!("La unidad {unit_index} no existe."))
            })?;
            let Some(unit) = course.unit(&ticket.unit_id) else {
                return Err(StudioError::Validation(format!("La unidad {unit_index} no existe.")));
            };
            let level = level.unwrap_or_else(|| config.unit_level.clone());

            let generator = generator(&config)?;
            let lessons = match generator.generate_unit_content(unit, &level).await {
                Ok(lessons) => lessons,
                Err(e) => {
                    viewer.abandon_unit_build(&ticket);
                    return Err(e);
                }
            };
            match viewer.finish_unit_build(&ticket, lessons, &mut library)? {
                BuildOutcome::Applied => {
                    if let Some(updated) = library.get(&course_id) {
                        print_outline(updated);
                    }
                }
                outcome => println!("La unidad no se actualizó ({outcome:?})."),
            }
        }
        Command::Grade {
            course_id,
            lesson_id,
            block_index,
            file,
        } => {
            let course = find_course(&library, &course_id)?;
            let lesson = course
                .units
                .iter()
                .flat_map(|u| u.lessons.iter())
                .find(|l| l.id == lesson_id)
                .ok_or_else(|| StudioError::Validation(format!("No existe la lección {lesson_id}.")))?;
            let block = lesson.blocks.get(block_index).ok_or_else(|| {
                StudioError::Validation(format!("No existe el bloque {block_index}."))
            })?;
            let submission = read_text(&file)?;
            let generator = generator(&config)?;
            let grade = generator
                .grade_submission(&submission, &block.rubric, &lesson.title, &block.content)
                .await;
            let json = serde_json::to_string_pretty(&grade)
                .map_err(|e| StudioError::Export(format!("no se pudo serializar la calificación: {e}")))?;
            println!("{json}");
        }
        Command::Score {
            course_id,
            unit,
            answers,
        } => {
            let course = find_course(&library, &course_id)?;
            let mut viewer = ViewerState::new(course);
            if !viewer.select_unit(course, unit) {
                return Err(StudioError::Validation(format!("La unidad {unit} no existe.")));
            }
            if let Some(path) = answers {
                let replay: Vec<ReplayAnswer> = serde_json::from_str(&read_text(&path)?)
                    .map_err(|e| {
                        warn!("Unreadable answers file {}: {e}", path.display());
                        StudioError::Validation(
                            "El archivo de respuestas no es una lista JSON válida.".to_string(),
                        )
                    })?;
                for a in replay {
                    match viewer.answer(course, &a.lesson, a.block, a.question, a.option) {
                        Some(f) => println!(
                            "{}#{} p{}: {} ({:.1}%)",
                            a.lesson,
                            a.block,
                            a.question,
                            if f.correct { "correcta" } else { "incorrecta" },
                            f.block_percentage
                        ),
                        None => println!("{}#{} p{}: ignorada", a.lesson, a.block, a.question),
                    }
                }
            }
            let stats = viewer.activity_stats(course);
            println!(
                "Calificación (tests): {:.1} / {TEST_GRADE_SCALE}",
                viewer.live_grade(course)
            );
            println!(
                "Actividades: {} x {:.1} pts = {:.1} / {ACTIVITY_POINT_POOL}",
                stats.count,
                stats.points_per_activity,
                stats.total_points()
            );
        }
        Command::Import { file } => {
            let course = library.import_json(&read_text(&file)?)?;
            println!("{}\t{}", course.id, course.title);
        }
        Command::ExportHtml { course_id, out } => {
            let course = find_course(&library, &course_id)?;
            let path = out.join(player_file_name(course));
            write_text(&path, &render_player(course)?)?;
            println!("{}", path.display());
        }
        Command::ExportJson { course_id, out } => {
            let course = find_course(&library, &course_id)?;
            let path = out.join(backup_file_name(course));
            write_text(&path, &course_backup_json(course)?)?;
            println!("{}", path.display());
        }
        Command::Submission {
            name,
            control,
            lesson,
            activity,
            content,
            reflection,
            out,
        } => {
            let submission = Submission::new(
                name,
                control,
                lesson,
                activity,
                read_text(&content)?,
                reflection,
            );
            submission.validate()?;
            let path = out.join(submission.file_name());
            write_text(&path, &submission.to_json()?)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn generator(config: &StudioConfig) -> Result<CourseGenerator<OpenRouterClient>> {
    let client = OpenRouterClient::new(config.timeout)?;
    Ok(CourseGenerator::new(client, config.clone()))
}

fn find_course<'a, S: CourseStore>(
    library: &'a Library<S>,
    course_id: &str,
) -> Result<&'a Course> {
    library
        .get(course_id)
        .ok_or_else(|| StudioError::Validation(format!("No existe la materia {course_id}.")))
}

fn print_outline(course: &Course) {
    println!("{} [{}] {}", course.title, course.subject_code, course.duration);
    if !course.description.is_empty() {
        println!("{}", course.description);
    }
    for (i, unit) in course.units.iter().enumerate() {
        let stats = scoring::activity_stats(unit);
        let state = if unit.is_built() { "" } else { " (sin construir)" };
        println!("{i}. {} [{}]{state}", unit.title, unit.id);
        for lesson in &unit.lessons {
            println!("   - {} [{}]", lesson.title, lesson.id);
            for (b, block) in lesson.blocks.iter().enumerate() {
                let kind = scoring::classify_block(block);
                let worth = match kind {
                    BlockKind::Activity => {
                        format!(" {:.1} pts", stats.points_per_activity)
                    }
                    BlockKind::Test => {
                        format!(" {} preguntas", block.questions().len())
                    }
                    _ => String::new(),
                };
                println!("       {b}. [{kind}] {}{worth}", block.title);
            }
        }
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| StudioError::Storage(format!("no se pudo leer {}: {e}", path.display())))
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            StudioError::Storage(format!("no se pudo crear {}: {e}", parent.display()))
        })?;
    }
    std::fs::write(path, text)
        .map_err(|e| StudioError::Storage(format!("no se pudo escribir {}: {e}", path.display())))
}
