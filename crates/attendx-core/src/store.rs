use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

use crate::embedding::Embedding;

/// Most recent records returned by a history query.
pub const HISTORY_LIMIT: usize = 20;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{what} not found")]
    NotFound { what: &'static str },

    #[error("caller has no tenant role")]
    Forbidden,

    #[error("attendance already recorded for student {student} on {date}")]
    DuplicateAttendance { student: String, date: NaiveDate },

    #[error("store backend fault: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: String,
    pub student: String,
    pub tenant: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub confidence: f64,
    pub recorded_at: String,
}

impl AttendanceRecord {
    pub fn new(
        student: &str,
        tenant: &str,
        date: NaiveDate,
        subject: Option<&str>,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            student: student.to_string(),
            tenant: tenant.to_string(),
            date,
            subject: subject.map(str::to_string),
            confidence,
            recorded_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Narrow query contract the pipeline depends on. Implementations own all
/// storage-engine details; the pipeline never sees query syntax.
///
/// `insert_attendance` must enforce uniqueness on (student, date, subject):
/// the pipeline's read-then-insert duplicate check is advisory and racy on
/// its own, so the gateway is the backstop against a double commit.
pub trait StoreGateway: Send + Sync {
    fn get_embedding(&self, student: &str) -> StoreResult<Embedding>;
    fn upsert_embedding(&self, student: &str, embedding: Embedding) -> StoreResult<()>;
    fn delete_embedding(&self, student: &str) -> StoreResult<()>;
    fn has_attendance_on(
        &self,
        student: &str,
        date: NaiveDate,
        subject: Option<&str>,
    ) -> StoreResult<bool>;
    fn insert_attendance(&self, record: AttendanceRecord) -> StoreResult<()>;
    fn attendance_history(&self, student: &str) -> StoreResult<Vec<AttendanceRecord>>;
    fn resolve_tenant_of(&self, student: &str) -> StoreResult<String>;
    fn resolve_tenant_of_caller(&self, caller: &str) -> StoreResult<String>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    /// student id -> owning tenant
    students: HashMap<String, String>,
    /// caller id -> tenant the caller administers
    admins: HashMap<String, String>,
    /// student id -> active embedding (one per student, upsert semantics)
    embeddings: HashMap<String, Embedding>,
    attendance: Vec<AttendanceRecord>,
}

impl Tables {
    fn has_attendance(&self, student: &str, date: NaiveDate, subject: Option<&str>) -> bool {
        self.attendance.iter().any(|record| {
            record.student == student
                && record.date == date
                && record.subject.as_deref() == subject
        })
    }

    fn insert_attendance(&mut self, record: AttendanceRecord) -> StoreResult<()> {
        if self.has_attendance(&record.student, record.date, record.subject.as_deref()) {
            return Err(StoreError::DuplicateAttendance {
                student: record.student,
                date: record.date,
            });
        }
        self.attendance.push(record);
        Ok(())
    }

    fn history(&self, student: &str) -> Vec<AttendanceRecord> {
        let mut records: Vec<AttendanceRecord> = self
            .attendance
            .iter()
            .filter(|record| record.student == student)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.recorded_at.cmp(&a.recorded_at))
        });
        records.truncate(HISTORY_LIMIT);
        records
    }
}

/// Reference backend: Mutex-guarded tables. The table lock makes the
/// uniqueness check in `insert_attendance` atomic with the insert.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Administrative setup, outside the pipeline's contract.
    pub fn add_student(&self, student: &str, tenant: &str) {
        self.lock()
            .students
            .insert(student.to_string(), tenant.to_string());
    }

    /// Administrative setup, outside the pipeline's contract.
    pub fn add_admin(&self, caller: &str, tenant: &str) {
        self.lock()
            .admins
            .insert(caller.to_string(), tenant.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl StoreGateway for MemoryStore {
    fn get_embedding(&self, student: &str) -> StoreResult<Embedding> {
        self.lock()
            .embeddings
            .get(student)
            .cloned()
            .ok_or(StoreError::NotFound { what: "embedding" })
    }

    fn upsert_embedding(&self, student: &str, embedding: Embedding) -> StoreResult<()> {
        self.lock()
            .embeddings
            .insert(student.to_string(), embedding);
        Ok(())
    }

    fn delete_embedding(&self, student: &str) -> StoreResult<()> {
        self.lock().embeddings.remove(student);
        Ok(())
    }

    fn has_attendance_on(
        &self,
        student: &str,
        date: NaiveDate,
        subject: Option<&str>,
    ) -> StoreResult<bool> {
        Ok(self.lock().has_attendance(student, date, subject))
    }

    fn insert_attendance(&self, record: AttendanceRecord) -> StoreResult<()> {
        self.lock().insert_attendance(record)
    }

    fn attendance_history(&self, student: &str) -> StoreResult<Vec<AttendanceRecord>> {
        Ok(self.lock().history(student))
    }

    fn resolve_tenant_of(&self, student: &str) -> StoreResult<String> {
        self.lock()
            .students
            .get(student)
            .cloned()
            .ok_or(StoreError::NotFound { what: "student" })
    }

    fn resolve_tenant_of_caller(&self, caller: &str) -> StoreResult<String> {
        self.lock()
            .admins
            .get(caller)
            .cloned()
            .ok_or(StoreError::Forbidden)
    }
}

/// File-backed backend for the CLI: one JSON document, rewritten atomically
/// on every mutation (tempfile in the target directory, fsync, persist,
/// 0o600). A process-wide mutex serializes read-modify-write cycles so the
/// uniqueness check stays atomic with the insert.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_student(&self, student: &str, tenant: &str) -> StoreResult<()> {
        self.mutate(|tables| {
            tables
                .students
                .insert(student.to_string(), tenant.to_string());
            Ok(())
        })
    }

    pub fn add_admin(&self, caller: &str, tenant: &str) -> StoreResult<()> {
        self.mutate(|tables| {
            tables.admins.insert(caller.to_string(), tenant.to_string());
            Ok(())
        })
    }

    fn load(&self) -> StoreResult<Tables> {
        if !self.path.exists() {
            return Ok(Tables::default());
        }
        let data = fs::read(&self.path)
            .map_err(|err| StoreError::Backend(format!("read {}: {err}", self.path.display())))?;
        serde_json::from_slice(&data).map_err(|err| {
            StoreError::Backend(format!("invalid store file {}: {err}", self.path.display()))
        })
    }

    fn save(&self, tables: &Tables) -> StoreResult<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .map_err(|err| StoreError::Backend(format!("create {}: {err}", parent.display())))?;

        let mut tmp = NamedTempFile::new_in(parent)
            .map_err(|err| StoreError::Backend(format!("tempfile in {}: {err}", parent.display())))?;
        {
            let file = tmp.as_file_mut();
            let mut writer = BufWriter::new(&mut *file);
            serde_json::to_writer_pretty(&mut writer, tables)
                .map_err(|err| StoreError::Backend(format!("serialize store: {err}")))?;
            writer
                .flush()
                .map_err(|err| StoreError::Backend(format!("flush store: {err}")))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|err| StoreError::Backend(format!("sync store: {err}")))?;

        let file = tmp.persist(&self.path).map_err(|err| {
            StoreError::Backend(format!("persist {}: {}", self.path.display(), err.error))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = file
                .metadata()
                .map_err(|err| StoreError::Backend(format!("stat store: {err}")))?
                .permissions();
            perms.set_mode(0o600);
            file.set_permissions(perms)
                .map_err(|err| StoreError::Backend(format!("chmod store: {err}")))?;
        }

        Ok(())
    }

    fn read<T>(&self, op: impl FnOnce(&Tables) -> StoreResult<T>) -> StoreResult<T> {
        let _guard = self.guard.lock().unwrap_or_else(|err| err.into_inner());
        let tables = self.load()?;
        op(&tables)
    }

    fn mutate<T>(&self, op: impl FnOnce(&mut Tables) -> StoreResult<T>) -> StoreResult<T> {
        let _guard = self.guard.lock().unwrap_or_else(|err| err.into_inner());
        let mut tables = self.load()?;
        let value = op(&mut tables)?;
        self.save(&tables)?;
        Ok(value)
    }
}

impl StoreGateway for JsonFileStore {
    fn get_embedding(&self, student: &str) -> StoreResult<Embedding> {
        self.read(|tables| {
            tables
                .embeddings
                .get(student)
                .cloned()
                .ok_or(StoreError::NotFound { what: "embedding" })
        })
    }

    fn upsert_embedding(&self, student: &str, embedding: Embedding) -> StoreResult<()> {
        self.mutate(|tables| {
            tables.embeddings.insert(student.to_string(), embedding);
            Ok(())
        })
    }

    fn delete_embedding(&self, student: &str) -> StoreResult<()> {
        self.mutate(|tables| {
            tables.embeddings.remove(student);
            Ok(())
        })
    }

    fn has_attendance_on(
        &self,
        student: &str,
        date: NaiveDate,
        subject: Option<&str>,
    ) -> StoreResult<bool> {
        self.read(|tables| Ok(tables.has_attendance(student, date, subject)))
    }

    fn insert_attendance(&self, record: AttendanceRecord) -> StoreResult<()> {
        self.mutate(|tables| tables.insert_attendance(record))
    }

    fn attendance_history(&self, student: &str) -> StoreResult<Vec<AttendanceRecord>> {
        self.read(|tables| Ok(tables.history(student)))
    }

    fn resolve_tenant_of(&self, student: &str) -> StoreResult<String> {
        self.read(|tables| {
            tables
                .students
                .get(student)
                .cloned()
                .ok_or(StoreError::NotFound { what: "student" })
        })
    }

    fn resolve_tenant_of_caller(&self, caller: &str) -> StoreResult<String> {
        self.read(|tables| {
            tables
                .admins
                .get(caller)
                .cloned()
                .ok_or(StoreError::Forbidden)
        })
    }
}
