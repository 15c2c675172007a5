use crate::ipc::error::err;
use crate::ipc::helpers::{get_optional_period, get_required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::period::parse_date;
use crate::store::{EventQuery, EventStore};
use serde_json::json;
use tracing::info;

fn event_query(params: &serde_json::Value) -> Result<EventQuery, HandlerErr> {
    let classroom_id = get_required_str(params, "classroomId")?;
    let date = parse_date(&get_required_str(params, "date")?)?;
    let period = get_optional_period(params)?;
    Ok(EventQuery {
        classroom_id,
        date,
        period: period.map(|p| p.get()),
    })
}

fn events_list(store: &dyn EventStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let query = event_query(params)?;
    let events = store
        .list_events(&query)
        .map_err(|e| HandlerErr::store("listEvents", e))?;
    Ok(json!({ "events": events }))
}

fn events_count(store: &dyn EventStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let query = event_query(params)?;
    let count = store
        .list_events(&query)
        .map_err(|e| HandlerErr::store("listEvents", e))?
        .len();
    Ok(json!({ "count": count }))
}

fn events_delete(store: &dyn EventStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "id")?;
    store
        .delete_event(&id)
        .map_err(|e| HandlerErr::store("deleteEvent", e))?;
    info!(id = %id, "event deleted");
    Ok(json!({ "deleted": id }))
}

fn events_bulk_approve(
    store: &dyn EventStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let query = event_query(params)?;
    let approved = store
        .bulk_approve_events(&query)
        .map_err(|e| HandlerErr::store("bulkApproveEvents", e))?;
    info!(
        classroom_id = %query.classroom_id,
        date = %query.date,
        period = ?query.period,
        approved,
        "events approved"
    );
    Ok(json!({ "approvedCount": approved }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&dyn EventStore, &serde_json::Value) -> Result<serde_json::Value, HandlerErr> =
        match req.method.as_str() {
            "events.list" => events_list,
            "events.count" => events_count,
            "events.delete" => events_delete,
            "events.bulkApprove" => events_bulk_approve,
            _ => return None,
        };
    let Some(store) = state.stores.active() else {
        return Some(err(
            &req.id,
            "no_store",
            "select a workspace or connect a remote first",
            None,
        ));
    };
    Some(respond(&req.id, handler(store, &req.params)))
}
