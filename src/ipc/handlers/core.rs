use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::issue::Records;
use crate::store::http::{HttpRecordStore, HttpStoreConfig};
use crate::store::StoreError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "store": state.store_kind(),
            "apiBaseUrl": state.remote.as_ref().map(|r| r.base_url().to_string()),
            "students": state.records.students.len(),
            "admitCards": state.records.admit_cards.len(),
            "loadedAt": state.records.loaded_at,
        }),
    )
}

/// Open `path` as the workspace. The snapshot is dropped and, when the
/// workspace becomes the active store, reloaded from it.
pub fn open_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<()> {
    let conn = db::open_db(&path)?;
    state.workspace = Some(path);
    state.db = Some(conn);
    if state.remote.is_none() {
        state.records = Records::default();
        if let Some(Err(e)) = state.reload() {
            tracing::warn!(error = %e, "workspace records not loaded");
        }
    }
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, path.clone()) {
        Ok(()) => {
            tracing::info!(workspace = %path.display(), "workspace selected");
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

/// Switch to the records API. The previous snapshot belonged to another
/// store and is dropped; `records.reload` fills it again.
pub fn connect_remote(state: &mut AppState, config: &HttpStoreConfig) -> Result<(), StoreError> {
    let store = HttpRecordStore::new(config)?;
    tracing::info!(base_url = %store.base_url(), "records API connected");
    state.remote = Some(store);
    state.records = Records::default();
    Ok(())
}

fn handle_store_connect(state: &mut AppState, req: &Request) -> serde_json::Value {
    let base_url = match required_str(req, "baseUrl") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let token = match required_str(req, "token") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let timeout_secs = match req.params.get("timeoutSecs") {
        None | Some(serde_json::Value::Null) => DEFAULT_TIMEOUT_SECS,
        Some(v) => match v.as_u64().filter(|n| (1..=600).contains(n)) {
            Some(n) => n,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "timeoutSecs must be an integer in 1..=600",
                    None,
                )
            }
        },
    };
    let config = HttpStoreConfig {
        base_url,
        token,
        timeout: Duration::from_secs(timeout_secs),
    };
    match connect_remote(state, &config) {
        Ok(()) => ok(
            &req.id,
            json!({
                "store": "remote",
                "apiBaseUrl": state.remote.as_ref().map(|r| r.base_url().to_string()),
            }),
        ),
        Err(e) => err(&req.id, e.code(), e.to_string(), None),
    }
}

fn handle_store_disconnect(state: &mut AppState, req: &Request) -> serde_json::Value {
    let was_connected = state.remote.take().is_some();
    if was_connected {
        tracing::info!("records API disconnected");
        state.records = Records::default();
        if let Some(Err(e)) = state.reload() {
            tracing::warn!(error = %e, "workspace records not loaded");
        }
    }
    ok(
        &req.id,
        json!({ "disconnected": was_connected, "store": state.store_kind() }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "store.connect" => Some(handle_store_connect(state, req)),
        "store.disconnect" => Some(handle_store_disconnect(state, req)),
        _ => None,
    }
}
