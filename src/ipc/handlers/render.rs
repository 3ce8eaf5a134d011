use std::path::PathBuf;

use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::handlers::admit_cards::find_card;
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{optional_bool, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::AdmitCard;
use crate::render::{self, RenderError};
use crate::template::document_for_card;

/// Photo bytes for embedding. Any failure degrades to the placeholder.
fn fetch_photo(state: &AppState, card: &AdmitCard) -> Option<Vec<u8>> {
    let reference = card.student_photo_url.as_deref()?;
    match state.with_store(|store| store.fetch_photo(reference))? {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(admit_card_id = %card.id, error = %e, "photo unavailable; using placeholder");
            None
        }
    }
}

fn handle_export_pdf(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_dir = match required_str(req, "outDir") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let card = match find_card(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let doc = document_for_card(&setup::organization(state), card);
    let photo = fetch_photo(state, card);
    let settings = setup::printer(state);
    let font_dirs = state.font_dirs();

    match render::export_pdf(&doc, photo.as_deref(), &settings, &font_dirs, &out_dir) {
        Ok(path) => ok(
            &req.id,
            json!({ "path": path.to_string_lossy(), "fileName": format!("{}.pdf", doc.file_stem) }),
        ),
        Err(e) => {
            tracing::error!(admit_card_id = %card.id, error = %e, "pdf export failed");
            err(&req.id, "export_failed", e.to_string(), None)
        }
    }
}

fn handle_print(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_dir = match required_str(req, "outDir") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let open = match optional_bool(req, "open") {
        Ok(v) => v.unwrap_or(false),
        Err(e) => return e,
    };
    let card = match find_card(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let doc = document_for_card(&setup::organization(state), card);
    let photo = fetch_photo(state, card);
    let settings = setup::printer(state);

    match render::print_view(&doc, photo.as_deref(), &settings, &out_dir, open) {
        Ok(path) => ok(
            &req.id,
            json!({ "path": path.to_string_lossy(), "opened": open }),
        ),
        Err(e) => {
            tracing::error!(admit_card_id = %card.id, error = %e, "print view unavailable");
            let message = match &e {
                RenderError::OutDir { .. } | RenderError::Io(_) => {
                    format!("{e}; check that the output directory is writable")
                }
                _ => e.to_string(),
            };
            err(&req.id, "print_view_unavailable", message, None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admitCards.exportPdf" => Some(handle_export_pdf(state, req)),
        "admitCards.print" => Some(handle_print(state, req)),
        _ => None,
    }
}
