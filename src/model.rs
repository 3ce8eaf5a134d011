use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Record ids and class names arrive as strings from most deployments and as
/// bare numbers from older ones; both are kept as text.
pub(crate) fn de_text<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match Raw::deserialize(d)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

fn de_opt_text<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match Option::<Raw>::deserialize(d)? {
        Some(Raw::Text(s)) => Some(s),
        Some(Raw::Number(n)) => Some(n.to_string()),
        None => None,
    })
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(alias = "_id", deserialize_with = "de_text")]
    pub id: String,
    #[serde(default, deserialize_with = "de_text")]
    pub registration_number: String,
    #[serde(
        default,
        deserialize_with = "de_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub roll_number: Option<String>,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    #[serde(rename = "class", default, deserialize_with = "de_text")]
    pub class_name: String,
    #[serde(default)]
    pub fee_paid: bool,
}

impl Student {
    /// A student can be issued an admit card once a roll number is assigned.
    pub fn is_eligible(&self) -> bool {
        non_blank(self.roll_number.as_deref()).is_some()
    }

    pub fn snapshot(&self) -> StudentSnapshot {
        StudentSnapshot {
            id: self.id.clone(),
            full_name: self.full_name.clone(),
            father_name: self.father_name.clone(),
            roll_number: self.roll_number.clone(),
            registration_number: self.registration_number.clone(),
            class_name: self.class_name.clone(),
        }
    }

    pub fn card_file_stem(&self) -> String {
        card_file_stem(self.roll_number.as_deref(), &self.registration_number)
    }
}

/// Student fields copied onto an admit card at issuance time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSnapshot {
    #[serde(alias = "_id", deserialize_with = "de_text")]
    pub id: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "de_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub roll_number: Option<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub registration_number: String,
    #[serde(rename = "class", default, deserialize_with = "de_text")]
    pub class_name: String,
}

impl StudentSnapshot {
    pub fn card_file_stem(&self) -> String {
        card_file_stem(self.roll_number.as_deref(), &self.registration_number)
    }
}

/// `admit_card_<roll number, else registration number>`, reduced to a single
/// safe path component.
pub fn card_file_stem(roll_number: Option<&str>, registration_number: &str) -> String {
    let key = non_blank(roll_number).unwrap_or_else(|| registration_number.trim());
    let cleaned: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "admit_card_unknown".to_string()
    } else {
        format!("admit_card_{cleaned}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamParameters {
    #[serde(default)]
    pub exam_name: String,
    #[serde(default)]
    pub exam_date: String,
    #[serde(default)]
    pub exam_time: String,
    #[serde(default)]
    pub exam_center: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl ExamParameters {
    /// Text form stored in the remote record's `fileUrl` field.
    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Inverse of [`ExamParameters::to_payload`]. Anything that is not an exam
    /// payload (including legacy real URLs) yields `None`.
    pub fn from_payload(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Self>(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(error = %e, "admit card exam payload not decodable");
                None
            }
        }
    }

    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        self.generated_at = Some(now);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmitCard {
    pub id: String,
    pub student: Option<StudentSnapshot>,
    pub exam_name: String,
    pub exam: Option<ExamParameters>,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
}

impl AdmitCard {
    pub fn student_id(&self) -> Option<&str> {
        self.student.as_ref().map(|s| s.id.as_str())
    }

    pub fn class_name(&self) -> Option<&str> {
        self.student.as_ref().map(|s| s.class_name.as_str())
    }

    pub fn file_stem(&self) -> String {
        match &self.student {
            Some(s) => s.card_file_stem(),
            None => card_file_stem(None, &self.id),
        }
    }
}

/// Everything the record store needs to create one admit card.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAdmitCard {
    pub student: StudentSnapshot,
    pub exam: ExamParameters,
    pub file_name: String,
    pub student_photo_url: Option<String>,
}

impl NewAdmitCard {
    pub fn for_student(
        student: &Student,
        exam: ExamParameters,
        student_photo_url: Option<String>,
    ) -> Self {
        Self {
            file_name: format!("{}.json", student.card_file_stem()),
            student: student.snapshot(),
            exam,
            student_photo_url: student_photo_url.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub name: String,
    pub size: u64,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    #[serde(rename = "uploadURL")]
    pub upload_url: String,
    #[serde(rename = "fileURL")]
    pub file_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassSelector {
    All,
    Class(String),
}

impl ClassSelector {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::All,
            Some(s) if s.eq_ignore_ascii_case("all") => Self::All,
            Some(s) => Self::Class(s.to_string()),
        }
    }

    pub fn matches(&self, class_name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Class(c) => c == class_name.trim(),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Class(c) => c,
        }
    }
}
