use crate::config;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_optional_period, get_optional_str, get_required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::period::workflow::{Session, SessionMode};
use serde_json::json;
use tracing::info;

pub fn snapshot(session: &Session) -> serde_json::Value {
    let completed = session.completed();
    let persisted = session.persisted_counts();
    let periods: Vec<serde_json::Value> = session
        .matrix()
        .entries()
        .map(|(period, entry)| {
            json!({
                "period": period,
                "entry": entry,
                "completed": completed[period.index()],
                "persistedCount": persisted[period.index()],
            })
        })
        .collect();
    json!({
        "classroomId": session.classroom_id(),
        "date": session.date(),
        "mode": session.mode(),
        "currentPeriod": session.current(),
        "editingPeriod": session.editing(),
        "completed": completed,
        "persistedCounts": persisted,
        "roster": session.roster(),
        "mapping": session.resolver().mapping(),
        "scoring": session.scoring(),
        "loadedEventCount": session.events().len(),
        "periods": periods,
    })
}

fn parse_mode(raw: Option<String>) -> Result<SessionMode, HandlerErr> {
    match raw.as_deref() {
        None | Some("create") => Ok(SessionMode::Create),
        Some("edit") => Ok(SessionMode::Edit),
        Some("view") => Ok(SessionMode::View),
        Some(other) => Err(HandlerErr::bad_params(format!(
            "mode must be create, edit or view, got {}",
            other
        ))),
    }
}

fn session_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let classroom_id = get_required_str(params, "classroomId")?;
    let date = get_required_str(params, "date")?;
    let mode = parse_mode(get_optional_str(params, "mode")?)?;
    let period = get_optional_period(params)?;
    if mode == SessionMode::Edit && period.is_none() {
        return Err(HandlerErr::bad_params("edit mode needs a period"));
    }

    let Some(store) = state.stores.active() else {
        return Err(HandlerErr::new("no_store", "select a workspace or connect a remote first"));
    };
    let settings = config::session_settings(state.db.as_ref())
        .map_err(|e| HandlerErr::internal("settings_failed", e))?;

    let mut session = Session::open(store, &classroom_id, &date, settings)?;
    let report = match (mode, period) {
        (SessionMode::Edit, Some(p)) => Some(session.enter_edit(store, p)?),
        (SessionMode::View, _) => Some(session.enter_view(store)?),
        _ => None,
    };
    info!(
        classroom_id = %classroom_id,
        date = %session.date(),
        mode = session.mode().as_str(),
        backend = store.backend_name(),
        "session ready"
    );
    let mut result = snapshot(&session);
    if let Some(r) = report {
        result["transition"] = json!(r);
    }
    state.session = Some(session);
    Ok(result)
}

fn handle_session_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, session_open(state, &req.params))
}

fn handle_session_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.session.as_ref() {
        Some(session) => ok(&req.id, json!({ "session": snapshot(session) })),
        None => ok(&req.id, json!({ "session": null })),
    }
}

fn handle_session_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let closed = state.session.take().is_some();
    ok(&req.id, json!({ "closed": closed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.open" => Some(handle_session_open(state, req)),
        "session.get" => Some(handle_session_get(state, req)),
        "session.close" => Some(handle_session_close(state, req)),
        _ => None,
    }
}
