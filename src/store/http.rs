//! REST client for the society's record API.
//!
//! Blocking reqwest client; every call carries the operator's bearer token.
//! Exam parameters travel inside the record's `fileUrl` text on this API and
//! are decoded into [`ExamParameters`] at this boundary.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use super::{RecordStore, StoreError};
use crate::model::{
    de_text, AdmitCard, ExamParameters, NewAdmitCard, Student, StudentSnapshot, UploadRequest,
    UploadTarget,
};

#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Origin of the API, e.g. `https://society.example.org`.
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
}

#[derive(Debug)]
pub struct HttpRecordStore {
    http: Client,
    base_url: String,
    token: String,
}

/// Admit card as the API returns it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdmitCardRecord {
    #[serde(alias = "_id", deserialize_with = "de_text")]
    id: String,
    #[serde(default, rename = "studentId")]
    student: Option<StudentRef>,
    #[serde(default)]
    exam_name: String,
    #[serde(default)]
    file_url: String,
    #[serde(default)]
    file_name: String,
    #[serde(default)]
    student_photo_url: Option<String>,
    #[serde(default)]
    uploaded_at: Option<String>,
}

/// `studentId` is populated on list responses and a bare id on create
/// responses.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StudentRef {
    Populated(StudentSnapshot),
    Bare(serde::de::IgnoredAny),
}

impl AdmitCardRecord {
    fn into_card(self, fallback: Option<&StudentSnapshot>) -> AdmitCard {
        let student = match self.student {
            Some(StudentRef::Populated(s)) => Some(s),
            Some(StudentRef::Bare(_)) | None => fallback.cloned(),
        };
        AdmitCard {
            id: self.id,
            student,
            exam: ExamParameters::from_payload(&self.file_url),
            exam_name: self.exam_name,
            file_name: self.file_name,
            student_photo_url: self.student_photo_url.filter(|s| !s.trim().is_empty()),
            uploaded_at: self.uploaded_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAdmitCardBody<'a> {
    student_id: &'a str,
    exam_name: &'a str,
    file_url: String,
    file_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    student_photo_url: Option<&'a str>,
}

impl HttpRecordStore {
    pub fn new(config: &HttpStoreConfig) -> Result<Self, StoreError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(StoreError::Config("base_url is empty".into()));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(StoreError::Config(format!(
                "base_url must be an http(s) URL: {base_url}"
            )));
        }
        if config.token.trim().is_empty() {
            return Err(StoreError::Config("token is empty".into()));
        }

        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url,
            token: config.token.trim().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Upload and photo URLs may be relative to the API origin.
    pub(crate) fn resolve(&self, url: &str) -> String {
        let url = url.trim();
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            format!("{}/{}", self.base_url, url)
        }
    }

    /// The bearer token is only sent back to the API origin, never to a
    /// pre-signed storage host.
    fn authorize(&self, builder: RequestBuilder, url: &str) -> RequestBuilder {
        if url.starts_with(&self.base_url) {
            builder.bearer_auth(&self.token)
        } else {
            builder
        }
    }

    fn check_status(resp: Response) -> Result<Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        let message = api_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
        let url = self.api_url(path);
        tracing::debug!(%url, "GET");
        let resp = self.authorize(self.http.get(&url), &url).send()?;
        let resp = Self::check_status(resp)?;
        Ok(resp.json()?)
    }

    fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, StoreError> {
        let url = self.api_url(path);
        tracing::debug!(%url, "POST");
        let resp = self.authorize(self.http.post(&url), &url).json(body).send()?;
        let resp = Self::check_status(resp)?;
        Ok(resp.json()?)
    }
}

/// Error text from `{ "error": ... }` or `{ "message": ... }` bodies.
fn api_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    v.get("error")
        .or_else(|| v.get("message"))
        .and_then(|m| m.as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(ToString::to_string)
}

impl RecordStore for HttpRecordStore {
    fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        self.get_json("/students")
    }

    fn list_admit_cards(&self) -> Result<Vec<AdmitCard>, StoreError> {
        let records: Vec<AdmitCardRecord> = self.get_json("/admit-cards")?;
        Ok(records.into_iter().map(|r| r.into_card(None)).collect())
    }

    fn create_admit_card(&self, card: &NewAdmitCard) -> Result<AdmitCard, StoreError> {
        let body = CreateAdmitCardBody {
            student_id: &card.student.id,
            exam_name: &card.exam.exam_name,
            file_url: card.exam.to_payload(),
            file_name: &card.file_name,
            student_photo_url: card.student_photo_url.as_deref(),
        };
        let record: AdmitCardRecord = self.post_json("/admit-cards", &body)?;
        Ok(record.into_card(Some(&card.student)))
    }

    fn request_upload(&self, req: &UploadRequest) -> Result<UploadTarget, StoreError> {
        self.post_json("/uploads/request-url", req)
    }

    fn put_upload(
        &self,
        target: &UploadTarget,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), StoreError> {
        let url = self.resolve(&target.upload_url);
        tracing::debug!(%url, bytes = body.len(), "PUT upload");
        let content_type = if content_type.trim().is_empty() {
            "application/octet-stream"
        } else {
            content_type
        };
        let resp = self
            .authorize(self.http.put(&url), &url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()?;
        Self::check_status(resp)?;
        Ok(())
    }

    fn fetch_photo(&self, reference: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.resolve(reference);
        let resp = self.authorize(self.http.get(&url), &url).send()?;
        let resp = Self::check_status(resp)?;
        Ok(resp.bytes()?.to_vec())
    }
}
