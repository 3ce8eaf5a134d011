//! Offline record store kept in the workspace database.
//!
//! Follows the REST contract except that a student can hold at most one
//! admit card and uploads are validated and checksummed.

use std::path::{Component, Path};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{RecordStore, StoreError};
use crate::model::{
    AdmitCard, ExamParameters, NewAdmitCard, Student, StudentSnapshot, UploadRequest,
    UploadTarget,
};

pub const UPLOADS_DIR: &str = "uploads";
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub struct WorkspaceStore<'a> {
    conn: &'a Connection,
    root: &'a Path,
}

impl<'a> WorkspaceStore<'a> {
    pub fn new(conn: &'a Connection, root: &'a Path) -> Self {
        Self { conn, root }
    }

    /// Insert or refresh students. New students are appended after the
    /// current last one; existing rows keep their position.
    pub fn upsert_students(&self, students: &[Student]) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut next_order: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students",
            [],
            |r| r.get(0),
        )?;
        let now = Utc::now().to_rfc3339();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO students(
                    id, registration_number, roll_number, full_name, father_name,
                    class_name, fee_paid, sort_order, updated_at
                 ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    registration_number = excluded.registration_number,
                    roll_number = excluded.roll_number,
                    full_name = excluded.full_name,
                    father_name = excluded.father_name,
                    class_name = excluded.class_name,
                    fee_paid = excluded.fee_paid,
                    updated_at = excluded.updated_at",
            )?;
            for s in students {
                if s.id.trim().is_empty() {
                    return Err(StoreError::Rejected("student id must not be empty".into()));
                }
                stmt.execute((
                    s.id.trim(),
                    s.registration_number.trim(),
                    s.roll_number
                        .as_deref()
                        .map(str::trim)
                        .filter(|v| !v.is_empty()),
                    s.full_name.trim(),
                    s.father_name
                        .as_deref()
                        .map(str::trim)
                        .filter(|v| !v.is_empty()),
                    s.class_name.trim(),
                    i64::from(s.fee_paid),
                    next_order,
                    &now,
                ))?;
                next_order += 1;
            }
        }
        tx.commit()?;
        Ok(students.len())
    }

    fn resolve_upload_path(&self, reference: &str) -> Result<std::path::PathBuf, StoreError> {
        let rel = Path::new(reference.trim());
        let inside_uploads = rel.components().next() == Some(Component::Normal(UPLOADS_DIR.as_ref()))
            && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !inside_uploads {
            return Err(StoreError::Rejected(format!(
                "not a workspace upload reference: {reference}"
            )));
        }
        Ok(self.root.join(rel))
    }

    fn upload_stored(&self, rel_path: &str) -> Result<bool, StoreError> {
        let state: Option<String> = self
            .conn
            .query_row(
                "SELECT state FROM uploads WHERE rel_path = ?",
                [rel_path],
                |r| r.get(0),
            )
            .optional()?;
        Ok(state.as_deref() == Some("stored"))
    }
}

fn upload_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}

/// `UNIQUE(student_id)` on `admit_cards`. Other constraint failures (NOT
/// NULL, primary key) stay database errors.
fn is_duplicate_card(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, msg) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                && msg
                    .as_deref()
                    .map_or(true, |m| m.contains("admit_cards.student_id"))
        }
        _ => false,
    }
}

impl RecordStore for WorkspaceStore<'_> {
    fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, registration_number, roll_number, full_name, father_name, class_name, fee_paid
             FROM students
             ORDER BY sort_order, rowid",
        )?;
        let rows = stmt
            .query_map([], |r| {
                let fee_paid: i64 = r.get(6)?;
                Ok(Student {
                    id: r.get(0)?,
                    registration_number: r.get(1)?,
                    roll_number: r.get(2)?,
                    full_name: r.get(3)?,
                    father_name: r.get(4)?,
                    class_name: r.get(5)?,
                    fee_paid: fee_paid != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn list_admit_cards(&self) -> Result<Vec<AdmitCard>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, student_json, exam_name, exam_date, exam_time, exam_center,
                    generated_at, file_name, student_photo_url, uploaded_at
             FROM admit_cards
             ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    ExamParameters {
                        exam_name: r.get(2)?,
                        exam_date: r.get(3)?,
                        exam_time: r.get(4)?,
                        exam_center: r.get(5)?,
                        generated_at: None,
                    },
                    r.get::<_, Option<String>>(6)?,
                    r.get::<_, String>(7)?,
                    r.get::<_, Option<String>>(8)?,
                    r.get::<_, String>(9)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, student_json, mut exam, generated_at, file_name, photo, uploaded_at) in rows {
            let student: StudentSnapshot = serde_json::from_str(&student_json)?;
            exam.generated_at = generated_at
                .as_deref()
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|v| v.with_timezone(&Utc));
            out.push(AdmitCard {
                id,
                student: Some(student),
                exam_name: exam.exam_name.clone(),
                exam: Some(exam),
                file_name,
                student_photo_url: photo,
                uploaded_at: Some(uploaded_at),
            });
        }
        Ok(out)
    }

    fn create_admit_card(&self, card: &NewAdmitCard) -> Result<AdmitCard, StoreError> {
        if let Some(photo) = card.student_photo_url.as_deref() {
            if photo.starts_with(UPLOADS_DIR) && !self.upload_stored(photo)? {
                return Err(StoreError::Rejected(format!(
                    "photo {photo} was never uploaded"
                )));
            }
        }

        let id = Uuid::new_v4().to_string();
        let uploaded_at = Utc::now().to_rfc3339();
        let student_json = serde_json::to_string(&card.student)?;
        let inserted = self.conn.execute(
            "INSERT INTO admit_cards(
                id, student_id, student_json, exam_name, exam_date, exam_time, exam_center,
                generated_at, file_name, student_photo_url, uploaded_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &id,
                &card.student.id,
                &student_json,
                &card.exam.exam_name,
                &card.exam.exam_date,
                &card.exam.exam_time,
                &card.exam.exam_center,
                card.exam.generated_at.map(|t| t.to_rfc3339()),
                &card.file_name,
                card.student_photo_url.as_deref(),
                &uploaded_at,
            ),
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_duplicate_card(&e) => {
                return Err(StoreError::Duplicate(card.student.id.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(AdmitCard {
            id,
            student: Some(card.student.clone()),
            exam_name: card.exam.exam_name.clone(),
            exam: Some(card.exam.clone()),
            file_name: card.file_name.clone(),
            student_photo_url: card.student_photo_url.clone(),
            uploaded_at: Some(uploaded_at),
        })
    }

    fn request_upload(&self, req: &UploadRequest) -> Result<UploadTarget, StoreError> {
        if req.name.trim().is_empty() {
            return Err(StoreError::Rejected("upload name must not be empty".into()));
        }
        if req.size == 0 || req.size > MAX_UPLOAD_BYTES {
            return Err(StoreError::Rejected(format!(
                "upload size must be in 1..={MAX_UPLOAD_BYTES} bytes"
            )));
        }
        if !req.content_type.to_ascii_lowercase().starts_with("image/") {
            return Err(StoreError::Rejected(format!(
                "only image uploads are accepted, got {}",
                req.content_type
            )));
        }

        let id = Uuid::new_v4().to_string();
        let rel_path = match upload_extension(&req.name) {
            Some(ext) => format!("{UPLOADS_DIR}/{id}.{ext}"),
            None => format!("{UPLOADS_DIR}/{id}"),
        };
        self.conn.execute(
            "INSERT INTO uploads(id, name, size, content_type, rel_path, sha256, state, created_at)
             VALUES(?, ?, ?, ?, ?, NULL, 'pending', ?)",
            (
                &id,
                req.name.trim(),
                req.size as i64,
                &req.content_type,
                &rel_path,
                Utc::now().to_rfc3339(),
            ),
        )?;
        Ok(UploadTarget {
            upload_url: rel_path.clone(),
            file_url: rel_path,
        })
    }

    fn put_upload(
        &self,
        target: &UploadTarget,
        _content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), StoreError> {
        let pending: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT id, size FROM uploads WHERE rel_path = ? AND state = 'pending'",
                [&target.upload_url],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let Some((upload_id, size)) = pending else {
            return Err(StoreError::NotFound(format!(
                "no pending upload at {}",
                target.upload_url
            )));
        };
        if body.len() as i64 != size {
            return Err(StoreError::Rejected(format!(
                "upload body is {} bytes, expected {}",
                body.len(),
                size
            )));
        }

        let path = self.resolve_upload_path(&target.upload_url)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &body)?;

        let mut hasher = Sha256::new();
        hasher.update(&body);
        let digest = format!("{:x}", hasher.finalize());
        self.conn.execute(
            "UPDATE uploads SET state = 'stored', sha256 = ? WHERE id = ?",
            (&digest, &upload_id),
        )?;
        tracing::debug!(path = %target.upload_url, sha256 = %digest, "upload stored");
        Ok(())
    }

    fn fetch_photo(&self, reference: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve_upload_path(reference)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(reference.to_string()));
        }
        Ok(std::fs::read(path)?)
    }
}
