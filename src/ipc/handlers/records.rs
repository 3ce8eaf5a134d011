use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, no_store, optional_bool, optional_str};
use crate::ipc::types::{AppState, Request};
use crate::issue::eligible_students;
use crate::model::{ClassSelector, Student};
use crate::store::workspace::WorkspaceStore;

fn handle_records_reload(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.reload() {
        None => no_store(req),
        Some(Ok(())) => ok(
            &req.id,
            json!({
                "students": state.records.students.len(),
                "admitCards": state.records.admit_cards.len(),
                "loadedAt": state.records.loaded_at,
            }),
        ),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "reload failed; keeping previous snapshot");
            err(&req.id, "store_unavailable", e.to_string(), None)
        }
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let selector = ClassSelector::parse(optional_str(req, "classFilter").as_deref());
    let eligible_only = match optional_bool(req, "eligibleOnly") {
        Ok(v) => v.unwrap_or(false),
        Err(e) => return e,
    };
    let students: Vec<&Student> = if eligible_only {
        eligible_students(&state.records.students, &selector).collect()
    } else {
        state
            .records
            .students
            .iter()
            .filter(|s| selector.matches(&s.class_name))
            .collect()
    };
    ok(&req.id, json!({ "students": students }))
}

/// Seed the workspace store with students.
fn handle_students_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("students") else {
        return err(&req.id, "bad_params", "missing students", None);
    };
    let students: Vec<Student> = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid students: {e}"), None),
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(root) = state.workspace.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let upserted = match WorkspaceStore::new(conn, root).upsert_students(&students) {
        Ok(n) => n,
        Err(e) => return err(&req.id, e.code(), e.to_string(), None),
    };
    if state.remote.is_none() {
        if let Some(Err(e)) = state.reload() {
            return err(&req.id, "store_unavailable", e.to_string(), None);
        }
    }
    ok(&req.id, json!({ "upserted": upserted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.reload" => Some(handle_records_reload(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "students.upsert" => Some(handle_students_upsert(state, req)),
        _ => None,
    }
}
