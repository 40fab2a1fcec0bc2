//! Course library and its persistence port.
//!
//! The library is read once when opened and rewritten in full on every
//! change. Storage sits behind [`CourseStore`] so generation and scoring
//! never touch the file system; [`JsonFileStore`] keeps the two records as
//! JSON files and [`MemoryStore`] keeps them in memory for tests.
//!
//! ```text
//! .profesoria/
//!   profesoria_library.json          # array of courses, newest first
//!   profesoria_teacher_session.json  # logged-in teacher, absent when logged out
//! ```

use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, StudioError};
use crate::model::{Course, TeacherProfile};

/// File holding the serialized course collection.
pub const LIBRARY_FILE: &str = "profesoria_library.json";

/// File holding the logged-in teacher profile.
pub const TEACHER_SESSION_FILE: &str = "profesoria_teacher_session.json";

/// Shown when an imported file is rejected.
pub const INVALID_BACKUP: &str =
    "El archivo JSON no es un respaldo válido de ProfesorIA o está dañado.";

/// Display name given to every teacher session.
pub const TEACHER_NAME: &str = "Docente TecNM";

/// Read-all / write-all persistence for the two library records.
pub trait CourseStore {
    /// All persisted courses. A missing record is an empty library.
    fn load_courses(&self) -> Result<Vec<Course>>;

    /// Replace the persisted collection.
    fn save_courses(&mut self, courses: &[Course]) -> Result<()>;

    fn load_teacher(&self) -> Result<Option<TeacherProfile>>;

    /// Persist the session, or clear it with `None`.
    fn save_teacher(&mut self, teacher: Option<&TeacherProfile>) -> Result<()>;
}

// ── File store ─────────────────────────────────────────────────────

/// [`CourseStore`] backed by two JSON files in one directory.
///
/// Writes go to a temp file that is then renamed into place, so a crash
/// never leaves a half-written library. Unreadable records load as empty with
/// a warning. Malformed records are first renamed to `<file>.corrupt-<ms>`,
/// so a later save starts a fresh file instead of overwriting them.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store, ensuring `dir` exists.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            StudioError::Storage(format!("no se pudo crear {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_record<T: DeserializeOwned>(&self, file: &str) -> Option<T> {
        let path = self.dir.join(file);
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str::<T>(&json) {
                Ok(value) => Some(value),
                Err(e) => {
                    self.quarantine(&path, file, &e);
                    None
                }
            },
            Err(e) => {
                warn!("Ignoring unreadable record at {}: {e}", path.display());
                None
            }
        }
    }

    /// Move a malformed record aside so the next write cannot replace it.
    fn quarantine(&self, path: &Path, file: &str, error: &serde_json::Error) {
        let aside = self
            .dir
            .join(format!("{file}.corrupt-{}", Utc::now().timestamp_millis()));
        match std::fs::rename(path, &aside) {
            Ok(()) => warn!(
                "Malformed record at {} ({error}); moved to {}",
                path.display(),
                aside.display()
            ),
            Err(e) => warn!(
                "Malformed record at {} ({error}); could not move it aside: {e}",
                path.display()
            ),
        }
    }

    /// Atomic write: serialize to a temp file, then rename into place.
    fn write_record<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        let final_path = self.dir.join(file);
        let tmp_path = self.dir.join(format!(".{file}.tmp"));

        let json = serde_json::to_string_pretty(value)
            .map_err(|e| StudioError::Storage(format!("no se pudo serializar {file}: {e}")))?;
        std::fs::write(&tmp_path, &json)
            .map_err(|e| StudioError::Storage(format!("no se pudo escribir {file}: {e}")))?;
        std::fs::rename(&tmp_path, &final_path)
            .map_err(|e| StudioError::Storage(format!("no se pudo reemplazar {file}: {e}")))?;

        debug!("Wrote {} ({} bytes)", final_path.display(), json.len());
        Ok(())
    }
}

impl CourseStore for JsonFileStore {
    fn load_courses(&self) -> Result<Vec<Course>> {
        Ok(self.read_record(LIBRARY_FILE).unwrap_or_default())
    }

    fn save_courses(&mut self, courses: &[Course]) -> Result<()> {
        self.write_record(LIBRARY_FILE, courses)
    }

    fn load_teacher(&self) -> Result<Option<TeacherProfile>> {
        Ok(self.read_record(TEACHER_SESSION_FILE))
    }

    fn save_teacher(&mut self, teacher: Option<&TeacherProfile>) -> Result<()> {
        match teacher {
            Some(profile) => self.write_record(TEACHER_SESSION_FILE, profile),
            None => {
                let path = self.dir.join(TEACHER_SESSION_FILE);
                match std::fs::remove_file(&path) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(StudioError::Storage(format!(
                        "no se pudo cerrar la sesión del docente: {e}"
                    ))),
                }
            }
        }
    }
}

// ── Memory store ───────────────────────────────────────────────────

/// In-memory [`CourseStore`]. Counts writes so tests can assert that a
/// failed operation wrote nothing.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub courses: Vec<Course>,
    pub teacher: Option<TeacherProfile>,
    pub writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_courses(courses: Vec<Course>) -> Self {
        Self {
            courses,
            ..Default::default()
        }
    }
}

impl CourseStore for MemoryStore {
    fn load_courses(&self) -> Result<Vec<Course>> {
        Ok(self.courses.clone())
    }

    fn save_courses(&mut self, courses: &[Course]) -> Result<()> {
        self.courses = courses.to_vec();
        self.writes += 1;
        Ok(())
    }

    fn load_teacher(&self) -> Result<Option<TeacherProfile>> {
        Ok(self.teacher.clone())
    }

    fn save_teacher(&mut self, teacher: Option<&TeacherProfile>) -> Result<()> {
        self.teacher = teacher.cloned();
        self.writes += 1;
        Ok(())
    }
}

// ── Library ────────────────────────────────────────────────────────

/// The teacher's saved courses plus the current session.
pub struct Library<S> {
    store: S,
    courses: Vec<Course>,
    teacher: Option<TeacherProfile>,
}

impl<S: CourseStore> Library<S> {
    /// Read both records once.
    pub fn open(store: S) -> Result<Self> {
        let courses = store.load_courses()?;
        let teacher = store.load_teacher()?;
        info!(
            "Library opened: {} courses, teacher session {}",
            courses.len(),
            if teacher.is_some() { "active" } else { "none" }
        );
        Ok(Self {
            store,
            courses,
            teacher,
        })
    }

    /// Courses, newest first.
    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn get(&self, course_id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == course_id)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Add a course at the front of the list and persist.
    pub fn add(&mut self, course: Course) -> Result<()> {
        info!("Adding course {} ({:?})", course.id, course.title);
        self.courses.insert(0, course);
        if let Err(e) = self.store.save_courses(&self.courses) {
            self.courses.remove(0);
            return Err(e);
        }
        Ok(())
    }

    /// Replace the course with the same id and persist. Returns `false`, and
    /// writes nothing, when no such course exists.
    pub fn update(&mut self, course: Course) -> Result<bool> {
        let Some(slot) = self.courses.iter_mut().find(|c| c.id == course.id) else {
            debug!("Update skipped: no course {}", course.id);
            return Ok(false);
        };
        let previous = std::mem::replace(slot, course);
        if let Err(e) = self.store.save_courses(&self.courses) {
            if let Some(slot) = self.courses.iter_mut().find(|c| c.id == previous.id) {
                *slot = previous;
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Import a course backup.
    ///
    /// The file must be a JSON object with a non-empty `title` and an array
    /// `units`. The course gets a fresh `imported_<ms>_<suffix>` id and goes
    /// to the front of the list. On any failure the collection is unchanged.
    pub fn import_json(&mut self, text: &str) -> Result<Course> {
        let mut value: Value = serde_json::from_str(text).map_err(|e| {
            warn!("Rejected import: not JSON: {e}");
            invalid_backup()
        })?;

        let has_title = value
            .get("title")
            .and_then(Value::as_str)
            .is_some_and(|t| !t.trim().is_empty());
        let has_units = value.get("units").is_some_and(Value::is_array);
        if !has_title || !has_units {
            warn!("Rejected import: title present={has_title}, units array={has_units}");
            return Err(invalid_backup());
        }

        let id = import_id();
        if let Some(obj) = value.as_object_mut() {
            obj.insert("id".to_string(), Value::String(id));
        }
        let course: Course = serde_json::from_value(value)
            .map_err(|e| {
            warn!("Rejected import: damaged course backup: {e}");
            invalid_backup()
        })?;

        self.add(course.clone())?;
        info!("Imported course {} ({:?})", course.id, course.title);
        Ok(course)
    }

    /// Start a teacher session.
    pub fn login(&mut self, teacher_id: &str) -> Result<TeacherProfile> {
        let teacher_id = teacher_id.trim();
        if teacher_id.is_empty() {
            return Err(StudioError::Validation(
                "El identificador del docente es obligatorio.".to_string(),
            ));
        }
        let profile = TeacherProfile {
            id: teacher_id.to_string(),
            name: TEACHER_NAME.to_string(),
            role: "admin".to_string(),
            joined_at: Utc::now().timestamp_millis(),
        };
        self.store.save_teacher(Some(&profile))?;
        info!("Teacher {teacher_id} logged in");
        self.teacher = Some(profile.clone());
        Ok(profile)
    }

    pub fn teacher(&self) -> Option<&TeacherProfile> {
        self.teacher.as_ref()
    }

    pub fn logout(&mut self) -> Result<()> {
        self.store.save_teacher(None)?;
        self.teacher = None;
        Ok(())
    }
}

fn invalid_backup() -> StudioError {
    StudioError::Validation(INVALID_BACKUP.to_string())
}

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn import_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..5)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    format!("imported_{}_{suffix}", Utc::now().timestamp_millis())
}
