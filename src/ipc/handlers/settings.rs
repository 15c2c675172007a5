use crate::config;
use crate::ipc::error::err;
use crate::ipc::helpers::{get_typed, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::period::catalog::{CategoryKey, PointColumn};
use crate::period::resolver::{CategoryMapping, EventTypeResolver};
use crate::period::transform::ScoringTable;
use serde_json::json;
use std::collections::BTreeMap;

/// Pushes freshly saved settings into an open session.
fn refresh_session(state: &mut AppState) -> Result<(), HandlerErr> {
    let settings = config::session_settings(state.db.as_ref())
        .map_err(|e| HandlerErr::internal("settings_failed", e))?;
    if let Some(session) = state.session.as_mut() {
        session.reconfigure(settings);
    }
    Ok(())
}

fn mapping_get(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let mapping = match state.db.as_ref() {
        Some(conn) => config::load_mapping(conn).map_err(|e| HandlerErr::internal("settings_failed", e))?,
        None => CategoryMapping::new(),
    };
    Ok(json!({ "mapping": mapping }))
}

fn mapping_set(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    let mapping: CategoryMapping = get_typed(params, "mapping")?;
    if let Some((key, _)) = mapping.iter().find(|(_, id)| id.trim().is_empty()) {
        return Err(HandlerErr::bad_params(format!("empty event type id for {}", key)));
    }
    config::save_mapping(conn, &mapping).map_err(|e| HandlerErr::internal("settings_failed", e))?;
    refresh_session(state)?;
    Ok(json!({ "mapping": mapping }))
}

fn mapping_autoconfigure(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let Some(store) = state.stores.active() else {
        return Err(HandlerErr::new("no_store", "select a workspace or connect a remote first"));
    };
    let catalog = store
        .list_event_types()
        .map_err(|e| HandlerErr::store("listEventTypes", e))?;
    let mapping = EventTypeResolver::new(catalog, CategoryMapping::new()).autoconfigure();
    let unresolved: Vec<CategoryKey> = CategoryKey::all().filter(|k| !mapping.contains_key(k)).collect();
    let saved = match state.db.as_ref() {
        Some(conn) => {
            config::save_mapping(conn, &mapping).map_err(|e| HandlerErr::internal("settings_failed", e))?;
            true
        }
        None => false,
    };
    if saved {
        refresh_session(state)?;
    }
    Ok(json!({
        "mapping": mapping,
        "unresolved": unresolved,
        "saved": saved,
    }))
}

fn scoring_get(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let overrides = match state.db.as_ref() {
        Some(conn) => config::load_scoring_overrides(conn)
            .map_err(|e| HandlerErr::internal("settings_failed", e))?,
        None => BTreeMap::new(),
    };
    Ok(json!({
        "table": ScoringTable::with_overrides(&overrides),
        "overrides": overrides,
    }))
}

fn scoring_set(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    let patch: BTreeMap<PointColumn, i32> = get_typed(params, "table")?;
    let mut overrides =
        config::load_scoring_overrides(conn).map_err(|e| HandlerErr::internal("settings_failed", e))?;
    overrides.extend(patch);
    config::save_scoring_overrides(conn, &overrides)
        .map_err(|e| HandlerErr::internal("settings_failed", e))?;
    refresh_session(state)?;
    Ok(json!({
        "table": ScoringTable::with_overrides(&overrides),
        "overrides": overrides,
    }))
}

fn handle_mapping_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, mapping_get(state))
}

fn handle_mapping_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, mapping_set(state, &req.params))
}

fn handle_mapping_autoconfigure(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, mapping_autoconfigure(state))
}

fn handle_scoring_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, scoring_get(state))
}

fn handle_scoring_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    respond(&req.id, scoring_set(state, &req.params))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "mapping.get" => Some(handle_mapping_get(state, req)),
        "mapping.set" => Some(handle_mapping_set(state, req)),
        "mapping.autoconfigure" => Some(handle_mapping_autoconfigure(state, req)),
        "scoring.get" => Some(handle_scoring_get(state, req)),
        "scoring.set" => Some(handle_scoring_set(state, req)),
        _ => None,
    }
}
