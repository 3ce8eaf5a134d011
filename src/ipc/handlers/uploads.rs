use std::path::PathBuf;

use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{on_store, required_str};
use crate::ipc::types::{AppState, Request};
use crate::issue::{upload_photo, PhotoFile};

/// Upload a photo ahead of issuance; the returned `fileUrl` goes into
/// `admitCards.issueOne` as `studentPhotoUrl`.
fn handle_upload_photo(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let photo = match PhotoFile::read(&path) {
        Ok(p) => p,
        Err(e) => {
            return err(
                &req.id,
                "upload_failed",
                format!("could not read {}: {e}", path.display()),
                None,
            )
        }
    };
    let (name, size, content_type) = (photo.name.clone(), photo.bytes.len(), photo.content_type.clone());
    match on_store(state, req, |store| upload_photo(store, photo)) {
        Err(e) => e,
        Ok(Ok(file_url)) => ok(
            &req.id,
            json!({
                "fileUrl": file_url,
                "name": name,
                "size": size,
                "contentType": content_type,
            }),
        ),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "photo upload failed");
            err(&req.id, "upload_failed", e.to_string(), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "uploads.photo" => Some(handle_upload_photo(state, req)),
        _ => None,
    }
}
