use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{HttpEventStore, SqliteEventStore};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "backend": state.stores.backend_name(),
            "sessionOpen": state.session.is_some(),
        }),
    )
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

    let opened = db::open_db(&path).and_then(|conn| Ok((conn, SqliteEventStore::open(&path)?)));
    match opened {
        Ok((conn, store)) => {
            info!(workspace = %path.display(), "workspace selected");
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            state.stores.local = Some(store);
            // sessions belong to the previous workspace
            state.session = None;
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "backend": state.stores.backend_name(),
                }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

fn remote_connect(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let base_url = get_optional_str(params, "baseUrl")?
        .or_else(|| state.config.remote_url.clone())
        .ok_or_else(|| HandlerErr::bad_params("missing baseUrl"))?;
    let token = get_optional_str(params, "token")?.or_else(|| state.config.remote_token.clone());
    let timeout = match params.get("timeoutSecs").and_then(|v| v.as_u64()) {
        Some(secs) if secs > 0 => Duration::from_secs(secs),
        Some(_) => return Err(HandlerErr::bad_params("timeoutSecs must be positive")),
        None => state.config.http_timeout,
    };
    let store = HttpEventStore::new(&base_url, token, timeout)
        .map_err(|e| HandlerErr::new("bad_params", e.to_string()))?;
    let url = store.base_url().to_string();
    state.stores.remote = Some(store);
    state.session = None;
    info!(base_url = %url, "remote store connected");
    Ok(json!({ "backend": "remote", "baseUrl": url }))
}

fn handle_remote_connect(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, remote_connect(state, &req.params))
}

fn handle_remote_disconnect(state: &mut AppState, req: &Request) -> serde_json::Value {
    let was_connected = state.stores.remote.take().is_some();
    if was_connected {
        state.session = None;
    }
    ok(
        &req.id,
        json!({
            "disconnected": was_connected,
            "backend": state.stores.backend_name(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "remote.connect" => Some(handle_remote_connect(state, req)),
        "remote.disconnect" => Some(handle_remote_disconnect(state, req)),
        _ => None,
    }
}
