use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::issue::Records;
use crate::store::http::HttpRecordStore;
use crate::store::workspace::WorkspaceStore;
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Connected records API. Takes precedence over the workspace store.
    pub remote: Option<HttpRecordStore>,
    /// Last successfully loaded students and admit cards of the active store.
    pub records: Records,
    /// Font search path for the PDF export; empty means the platform default.
    pub font_dirs: Vec<PathBuf>,
}

impl AppState {
    pub fn store_kind(&self) -> Option<&'static str> {
        if self.remote.is_some() {
            Some("remote")
        } else if self.db.is_some() && self.workspace.is_some() {
            Some("workspace")
        } else {
            None
        }
    }

    pub fn font_dirs(&self) -> Vec<PathBuf> {
        if self.font_dirs.is_empty() {
            crate::render::default_font_dirs()
        } else {
            self.font_dirs.clone()
        }
    }

    /// Run `f` against the active record store, if there is one.
    pub fn with_store<T>(&self, f: impl FnOnce(&dyn RecordStore) -> T) -> Option<T> {
        if let Some(remote) = self.remote.as_ref() {
            return Some(f(remote));
        }
        match (self.db.as_ref(), self.workspace.as_deref()) {
            (Some(conn), Some(root)) => Some(f(&WorkspaceStore::new(conn, root))),
            _ => None,
        }
    }

    /// Replace the snapshot from the active store. On failure the previous
    /// snapshot stays.
    pub fn reload(&mut self) -> Option<Result<(), StoreError>> {
        let loaded = self.with_store(Records::load)?;
        Some(loaded.map(|records| self.records = records))
    }
}
