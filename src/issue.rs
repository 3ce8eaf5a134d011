//! Admit card issuance: the loaded record snapshot, single issue, bulk issue
//! and the list/summary views over the snapshot.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::{
    AdmitCard, ClassSelector, ExamParameters, NewAdmitCard, Student, UploadRequest,
};
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("student {0} is not in the loaded student list")]
    StudentNotFound(String),

    #[error("could not read photo {path}: {source}")]
    PhotoFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("photo upload failed: {0}")]
    Upload(#[source] StoreError),

    #[error("failed to create admit card: {0}")]
    Create(#[source] StoreError),
}

impl IssueError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::StudentNotFound(_) => "student_not_found",
            Self::PhotoFile { .. } | Self::Upload(_) => "upload_failed",
            Self::Create(StoreError::Duplicate(_)) => "duplicate",
            Self::Create(_) => "create_failed",
        }
    }
}

/// Students and admit cards as last loaded from the store. Only
/// [`Records::load`] produces a new snapshot; a failed load leaves the
/// caller's previous snapshot in place.
#[derive(Debug, Clone, Default)]
pub struct Records {
    pub students: Vec<Student>,
    pub admit_cards: Vec<AdmitCard>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl Records {
    pub fn load(store: &dyn RecordStore) -> Result<Self, StoreError> {
        let students = store.list_students()?;
        let admit_cards = store.list_admit_cards()?;
        tracing::info!(
            students = students.len(),
            admit_cards = admit_cards.len(),
            "records loaded"
        );
        Ok(Self {
            students,
            admit_cards,
            loaded_at: Some(Utc::now()),
        })
    }

    pub fn find_student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn find_card(&self, id: &str) -> Option<&AdmitCard> {
        self.admit_cards.iter().find(|c| c.id == id)
    }

    pub fn issued_student_ids(&self) -> HashSet<&str> {
        self.admit_cards
            .iter()
            .filter_map(AdmitCard::student_id)
            .collect()
    }
}

/// A photo read from disk, ready for the two-step upload.
#[derive(Debug, Clone)]
pub struct PhotoFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoFile {
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("photo")
            .to_string();
        Ok(Self {
            content_type: content_type_for(&name).to_string(),
            name,
            bytes,
        })
    }
}

fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Request an upload target, then transmit the bytes to it. Returns the
/// reference to store on the admit card.
pub fn upload_photo(store: &dyn RecordStore, photo: PhotoFile) -> Result<String, StoreError> {
    let target = store.request_upload(&UploadRequest {
        name: photo.name.clone(),
        size: photo.bytes.len() as u64,
        content_type: photo.content_type.clone(),
    })?;
    store.put_upload(&target, &photo.content_type, photo.bytes)?;
    tracing::info!(name = %photo.name, file_url = %target.file_url, "photo uploaded");
    Ok(target.file_url)
}

#[derive(Debug, Clone)]
pub enum PhotoSource {
    None,
    /// Reference from an earlier upload.
    Uploaded(String),
    /// Local file to upload before the card is created.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub student_id: String,
    pub exam: ExamParameters,
    pub photo: PhotoSource,
}

/// Issue one admit card. The upload (if any) must succeed before the create
/// call is made, so a failed upload never leaves a record behind. No duplicate
/// check happens here.
pub fn issue_one(
    store: &dyn RecordStore,
    records: &Records,
    req: IssueRequest,
) -> Result<AdmitCard, IssueError> {
    let student = records
        .find_student(&req.student_id)
        .ok_or_else(|| IssueError::StudentNotFound(req.student_id.clone()))?;

    let photo_url = match req.photo {
        PhotoSource::None => None,
        PhotoSource::Uploaded(url) => Some(url),
        PhotoSource::File(path) => {
            let photo = PhotoFile::read(&path).map_err(|source| IssueError::PhotoFile {
                path: path.clone(),
                source,
            })?;
            Some(upload_photo(store, photo).map_err(IssueError::Upload)?)
        }
    };

    let new = NewAdmitCard::for_student(student, req.exam.stamped(Utc::now()), photo_url);
    let card = store.create_admit_card(&new).map_err(IssueError::Create)?;
    tracing::info!(student_id = %student.id, admit_card_id = %card.id, "admit card issued");
    Ok(card)
}

pub fn eligible_students<'a>(
    students: &'a [Student],
    selector: &ClassSelector,
) -> impl Iterator<Item = &'a Student> + 'a {
    let selector = selector.clone();
    students
        .iter()
        .filter(move |s| s.is_eligible() && selector.matches(&s.class_name))
}

#[derive(Debug, Clone)]
pub struct BulkPlan<'a> {
    pub eligible: usize,
    pub worklist: Vec<&'a Student>,
}

impl BulkPlan<'_> {
    pub fn already_issued(&self) -> usize {
        self.eligible - self.worklist.len()
    }
}

/// Eligible students for `selector` minus those already holding a card in the
/// snapshot. Computed once per run; not re-checked between creates.
pub fn plan_bulk<'a>(records: &'a Records, selector: &ClassSelector) -> BulkPlan<'a> {
    let issued = records.issued_student_ids();
    let eligible: Vec<&Student> = eligible_students(&records.students, selector).collect();
    let worklist = eligible
        .iter()
        .copied()
        .filter(|s| !issued.contains(s.id.as_str()))
        .collect();
    BulkPlan {
        eligible: eligible.len(),
        worklist,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSummary {
    pub target_class: String,
    pub eligible: usize,
    pub skipped: usize,
    pub generated: usize,
    pub failed: usize,
}

/// Create a card for every worklist entry, one request at a time. A failed
/// create is counted and the run moves on; nothing is rolled back.
pub fn run_bulk(
    store: &dyn RecordStore,
    plan: &BulkPlan<'_>,
    selector: &ClassSelector,
    exam: &ExamParameters,
) -> BulkSummary {
    let span = tracing::info_span!("bulk_issue", target_class = selector.as_str());
    let _guard = span.enter();

    let mut generated = 0;
    let mut failed = 0;
    for student in &plan.worklist {
        let new = NewAdmitCard::for_student(student, exam.clone().stamped(Utc::now()), None);
        match store.create_admit_card(&new) {
            Ok(_) => generated += 1,
            Err(e) => {
                failed += 1;
                tracing::warn!(student_id = %student.id, error = %e, "admit card not created");
            }
        }
    }

    tracing::info!(generated, failed, skipped = plan.already_issued(), "bulk issue finished");
    BulkSummary {
        target_class: selector.as_str().to_string(),
        eligible: plan.eligible,
        skipped: plan.already_issued(),
        generated,
        failed,
    }
}

/// Operator's list view: free-text search plus class filter.
#[derive(Debug, Clone)]
pub struct CardFilter {
    pub search: String,
    pub class: ClassSelector,
}

impl CardFilter {
    pub fn matches(&self, card: &AdmitCard) -> bool {
        let term = self.search.trim().to_lowercase();
        let Some(student) = card.student.as_ref() else {
            return term.is_empty() && self.class == ClassSelector::All;
        };
        let search_ok = term.is_empty()
            || student.full_name.to_lowercase().contains(&term)
            || student
                .roll_number
                .as_deref()
                .is_some_and(|r| r.contains(self.search.trim()));
        search_ok && self.class.matches(&student.class_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassCount {
    pub class: String,
    pub count: usize,
}

pub const UNKNOWN_CLASS: &str = "Unknown";

/// Cards per class; numeric class names first in numeric order, then the rest
/// alphabetically.
pub fn class_counts(cards: &[AdmitCard]) -> Vec<ClassCount> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for card in cards {
        let class = card
            .class_name()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(UNKNOWN_CLASS);
        *counts.entry(class.to_string()).or_default() += 1;
    }
    let mut out: Vec<ClassCount> = counts
        .into_iter()
        .map(|(class, count)| ClassCount { class, count })
        .collect();
    out.sort_by(|a, b| {
        match (a.class.parse::<i64>().ok(), b.class.parse::<i64>().ok()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.class.cmp(&b.class),
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UploadTarget;
    use std::cell::{Cell, RefCell};

    /// Store double whose create calls fail for chosen students.
    #[derive(Default)]
    struct ScriptedStore {
        students: Vec<Student>,
        cards: RefCell<Vec<AdmitCard>>,
        fail_create_for: HashSet<String>,
        fail_upload: bool,
        create_calls: Cell<usize>,
        upload_calls: Cell<usize>,
    }

    impl RecordStore for ScriptedStore {
        fn list_students(&self) -> Result<Vec<Student>, StoreError> {
            Ok(self.students.clone())
        }

        fn list_admit_cards(&self) -> Result<Vec<AdmitCard>, StoreError> {
            Ok(self.cards.borrow().clone())
        }

        fn create_admit_card(&self, card: &NewAdmitCard) -> Result<AdmitCard, StoreError> {
            self.create_calls.set(self.create_calls.get() + 1);
            if self.fail_create_for.contains(&card.student.id) {
                return Err(StoreError::Api {
                    status: 500,
                    message: "boom".into(),
                });
            }
            let created = AdmitCard {
                id: format!("card-{}", card.student.id),
                student: Some(card.student.clone()),
                exam_name: card.exam.exam_name.clone(),
                exam: Some(card.exam.clone()),
                file_name: card.file_name.clone(),
                student_photo_url: card.student_photo_url.clone(),
                uploaded_at: None,
            };
            self.cards.borrow_mut().push(created.clone());
            Ok(created)
        }

        fn request_upload(&self, _req: &UploadRequest) -> Result<UploadTarget, StoreError> {
            self.upload_calls.set(self.upload_calls.get() + 1);
            if self.fail_upload {
                return Err(StoreError::Api {
                    status: 413,
                    message: "File too large".into(),
                });
            }
            Ok(UploadTarget {
                upload_url: "/put/1".into(),
                file_url: "/objects/1".into(),
            })
        }

        fn put_upload(
            &self,
            _target: &UploadTarget,
            _content_type: &str,
            _body: Vec<u8>,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        fn fetch_photo(&self, reference: &str) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::NotFound(reference.into()))
        }
    }

    fn student(id: &str, roll: Option<&str>, class: &str) -> Student {
        Student {
            id: id.into(),
            registration_number: format!("REG-{id}"),
            roll_number: roll.map(Into::into),
            full_name: format!("Student {id}"),
            father_name: None,
            class_name: class.into(),
            fee_paid: true,
        }
    }

    fn card_for(s: &Student) -> AdmitCard {
        AdmitCard {
            id: format!("existing-{}", s.id),
            student: Some(s.snapshot()),
            exam_name: "GK".into(),
            exam: None,
            file_name: format!("{}.json", s.card_file_stem()),
            student_photo_url: None,
            uploaded_at: None,
        }
    }

    fn exam() -> ExamParameters {
        ExamParameters {
            exam_name: "Haryana GK Exam 2025".into(),
            exam_date: "2025-06-01".into(),
            exam_time: "10:00 AM - 12:00 PM".into(),
            exam_center: "Hall A".into(),
            generated_at: None,
        }
    }

    #[test]
    fn students_without_roll_numbers_are_never_eligible() {
        let students = vec![
            student("1", None, "8"),
            student("2", Some(""), "8"),
            student("3", Some("103"), "8"),
            student("4", None, "9"),
        ];
        for raw in [None, Some("all"), Some("8"), Some("9"), Some("12")] {
            let selector = ClassSelector::parse(raw);
            let ids: Vec<&str> = eligible_students(&students, &selector)
                .map(|s| s.id.as_str())
                .collect();
            assert!(!ids.contains(&"1") && !ids.contains(&"2") && !ids.contains(&"4"));
        }
    }

    #[test]
    fn worklist_excludes_students_with_cards_in_any_class() {
        let a = student("a", Some("1"), "8");
        let b = student("b", Some("2"), "9");
        let c = student("c", Some("3"), "9");
        let records = Records {
            admit_cards: vec![card_for(&b)],
            students: vec![a, b, c],
            loaded_at: None,
        };
        for raw in ["all", "9"] {
            let plan = plan_bulk(&records, &ClassSelector::parse(Some(raw)));
            assert!(plan.worklist.iter().all(|s| s.id != "b"));
            assert_eq!(plan.already_issued(), 1);
        }
        let plan = plan_bulk(&records, &ClassSelector::parse(Some("8")));
        assert_eq!(plan.worklist.len(), 1);
        assert_eq!(plan.already_issued(), 0);
    }

    #[test]
    fn bulk_issue_creates_one_card_per_pending_student() {
        let students: Vec<Student> = (1..=5)
            .map(|i| student(&i.to_string(), Some(&format!("10{i}")), "7"))
            .collect();
        let store = ScriptedStore {
            students: students.clone(),
            ..ScriptedStore::default()
        };
        let records = Records::load(&store).expect("load");
        let selector = ClassSelector::All;
        let plan = plan_bulk(&records, &selector);
        let summary = run_bulk(&store, &plan, &selector, &exam());
        assert_eq!(summary.generated, 5);
        assert_eq!(summary.failed, 0);
        assert_eq!(store.cards.borrow().len(), 5);
        assert!(store
            .cards
            .borrow()
            .iter()
            .all(|c| c.exam.as_ref().is_some_and(|e| e.generated_at.is_some())));

        let reloaded = Records::load(&store).expect("reload");
        let again = plan_bulk(&reloaded, &selector);
        assert!(again.worklist.is_empty());
    }

    #[test]
    fn one_failed_create_does_not_stop_the_run() {
        let students: Vec<Student> = (1..=4)
            .map(|i| student(&i.to_string(), Some(&format!("20{i}")), "6"))
            .collect();
        let store = ScriptedStore {
            students,
            fail_create_for: HashSet::from(["2".to_string()]),
            ..ScriptedStore::default()
        };
        let records = Records::load(&store).expect("load");
        let selector = ClassSelector::parse(Some("6"));
        let plan = plan_bulk(&records, &selector);
        let summary = run_bulk(&store, &plan, &selector, &exam());
        assert_eq!(summary.generated, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(store.create_calls.get(), 4);
    }

    #[test]
    fn failed_upload_creates_nothing() {
        let s = student("1", Some("101"), "8");
        let store = ScriptedStore {
            students: vec![s],
            fail_upload: true,
            ..ScriptedStore::default()
        };
        let records = Records::load(&store).expect("load");
        let dir = tempfile::tempdir().expect("tempdir");
        let photo = dir.path().join("face.jpg");
        std::fs::write(&photo, b"jpeg").expect("write photo");

        let err = issue_one(
            &store,
            &records,
            IssueRequest {
                student_id: "1".into(),
                exam: exam(),
                photo: PhotoSource::File(photo),
            },
        )
        .expect_err("upload should fail");
        assert_eq!(err.code(), "upload_failed");
        assert!(err.to_string().contains("File too large"));
        assert_eq!(store.create_calls.get(), 0);
    }

    #[test]
    fn unknown_student_makes_no_store_calls() {
        let store = ScriptedStore::default();
        let err = issue_one(
            &store,
            &Records::default(),
            IssueRequest {
                student_id: "ghost".into(),
                exam: exam(),
                photo: PhotoSource::File(PathBuf::from("/nope.png")),
            },
        )
        .expect_err("missing student");
        assert_eq!(err.code(), "student_not_found");
        assert_eq!(store.upload_calls.get(), 0);
        assert_eq!(store.create_calls.get(), 0);
    }

    #[test]
    fn issue_one_attaches_uploaded_photo() {
        let s = student("1", Some("101"), "8");
        let store = ScriptedStore {
            students: vec![s],
            ..ScriptedStore::default()
        };
        let records = Records::load(&store).expect("load");
        let dir = tempfile::tempdir().expect("tempdir");
        let photo = dir.path().join("face.png");
        std::fs::write(&photo, b"png").expect("write photo");
        let card = issue_one(
            &store,
            &records,
            IssueRequest {
                student_id: "1".into(),
                exam: exam(),
                photo: PhotoSource::File(photo),
            },
        )
        .expect("issued");
        assert_eq!(card.student_photo_url.as_deref(), Some("/objects/1"));
        assert_eq!(card.file_name, "admit_card_101.json");
    }

    #[test]
    fn list_filter_and_class_counts() {
        let a = student("a", Some("501"), "10");
        let b = student("b", Some("502"), "9");
        let mut cards = vec![card_for(&a), card_for(&b)];
        cards.push(AdmitCard {
            student: None,
            ..card_for(&a)
        });

        let by_roll = CardFilter {
            search: "502".into(),
            class: ClassSelector::All,
        };
        assert_eq!(cards.iter().filter(|c| by_roll.matches(c)).count(), 1);

        let by_name = CardFilter {
            search: "student A".into(),
            class: ClassSelector::parse(Some("10")),
        };
        assert_eq!(cards.iter().filter(|c| by_name.matches(c)).count(), 1);

        let counts = class_counts(&cards);
        assert_eq!(
            counts.iter().map(|c| c.class.as_str()).collect::<Vec<_>>(),
            vec!["9", "10", UNKNOWN_CLASS]
        );
    }
}
