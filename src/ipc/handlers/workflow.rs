use crate::ipc::handlers::session::snapshot;
use crate::ipc::helpers::{get_period, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::period::workflow::{Session, TransitionReport};
use crate::store::EventStore;
use serde_json::json;

/// Splits the state into the active store and the open session.
fn parts(state: &mut AppState) -> Result<(&dyn EventStore, &mut Session), HandlerErr> {
    let store = state
        .stores
        .active()
        .ok_or_else(|| HandlerErr::new("no_store", "select a workspace or connect a remote first"))?;
    let session = state
        .session
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_session", "open a session first"))?;
    Ok((store, session))
}

fn transition(
    state: &mut AppState,
    f: impl FnOnce(&dyn EventStore, &mut Session) -> Result<TransitionReport, crate::period::PeriodError>,
) -> Result<serde_json::Value, HandlerErr> {
    let (store, session) = parts(state)?;
    let report = f(store, session)?;
    Ok(json!({
        "transition": report,
        "session": snapshot(session),
    }))
}

fn submit_all(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let (store, session) = parts(state)?;
    let summary = session.submit_all(store)?;
    Ok(json!({
        "summary": summary,
        "session": snapshot(session),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "workflow.advance" => transition(state, |store, s| s.advance(store)),
        "workflow.retreat" => transition(state, |_, s| s.retreat()),
        "workflow.enterEdit" => match get_period(&req.params) {
            Ok(p) => transition(state, |store, s| s.enter_edit(store, p)),
            Err(e) => Err(e),
        },
        "workflow.saveEdit" => transition(state, |store, s| s.save_edit(store)),
        "workflow.cancelEdit" => transition(state, |_, s| s.cancel_edit()),
        "workflow.enterView" => transition(state, |store, s| s.enter_view(store)),
        "workflow.enterCreate" => transition(state, |_, s| s.enter_create()),
        "workflow.submitAll" => submit_all(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
