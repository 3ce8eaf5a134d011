use rusqlite::Connection;
use serde_json::Value;

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::store::RecordStore;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn no_store(req: &Request) -> Value {
    err(
        &req.id,
        "no_store",
        "select a workspace or connect to the records API first",
        None,
    )
}

/// `with_store` that answers `no_store` when neither backend is available.
pub fn on_store<T>(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&dyn RecordStore) -> T,
) -> Result<T, Value> {
    state.with_store(f).ok_or_else(|| no_store(req))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn optional_bool(req: &Request, key: &str) -> Result<Option<bool>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must be boolean", key),
            None,
        )),
    }
}

/// Exam fields are free text; absent or non-string values read as empty.
pub fn text_param(obj: &Value, key: &str) -> String {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}
