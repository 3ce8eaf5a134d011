//! Record store seam.
//!
//! The admit-card workflows only ever talk to a [`RecordStore`]. Two backends
//! exist: the remote REST API ([`http::HttpRecordStore`]) and an offline store
//! kept in the workspace database ([`workspace::WorkspaceStore`]).

pub mod http;
pub mod workspace;

use thiserror::Error;

use crate::model::{AdmitCard, NewAdmitCard, Student, UploadRequest, UploadTarget};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("record store error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("student {0} already has an admit card")]
    Duplicate(String),

    #[error("{0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http(_) | Self::Api { .. } | Self::Io(_) => "store_unavailable",
            Self::Db(_) => "db_query_failed",
            Self::Decode(_) => "store_bad_response",
            Self::Duplicate(_) => "duplicate",
            Self::Rejected(_) => "bad_params",
            Self::NotFound(_) => "not_found",
            Self::Config(_) => "bad_params",
        }
    }
}

/// Narrow contract the admit-card core needs from the system of record.
pub trait RecordStore {
    fn list_students(&self) -> Result<Vec<Student>, StoreError>;

    fn list_admit_cards(&self) -> Result<Vec<AdmitCard>, StoreError>;

    fn create_admit_card(&self, card: &NewAdmitCard) -> Result<AdmitCard, StoreError>;

    /// First half of the photo upload protocol: reserve a target.
    fn request_upload(&self, req: &UploadRequest) -> Result<UploadTarget, StoreError>;

    /// Second half: transmit the bytes to the reserved target.
    fn put_upload(
        &self,
        target: &UploadTarget,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), StoreError>;

    /// Raw bytes behind a stored photo reference.
    fn fetch_photo(&self, reference: &str) -> Result<Vec<u8>, StoreError>;
}
