use crate::ipc::error::err;
use crate::ipc::helpers::{get_optional_str, get_required_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::period::catalog::describe_all;
use crate::store::{EventStore, SqliteEventStore};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedClassroom {
    id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedStudent {
    id: Option<String>,
    classroom_id: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedEventType {
    id: Option<String>,
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    default_points: i32,
}

fn id_or_new(id: Option<String>) -> String {
    id.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn seed_list<T: for<'de> Deserialize<'de>>(
    params: &serde_json::Value,
    key: &str,
) -> Result<Vec<T>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| HandlerErr::bad_params(format!("invalid {}: {}", key, e))),
    }
}

fn store_seed(store: &SqliteEventStore, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let classrooms: Vec<SeedClassroom> = seed_list(params, "classrooms")?;
    let students: Vec<SeedStudent> = seed_list(params, "students")?;
    let event_types: Vec<SeedEventType> = seed_list(params, "eventTypes")?;

    let mut classroom_ids = Vec::with_capacity(classrooms.len());
    for c in classrooms {
        let id = id_or_new(c.id);
        store
            .upsert_classroom(&id, c.name.trim())
            .map_err(|e| HandlerErr::store("seedClassrooms", e))?;
        classroom_ids.push(id);
    }

    let mut student_ids = Vec::with_capacity(students.len());
    for s in students {
        let id = id_or_new(s.id);
        store
            .upsert_student(&id, &s.classroom_id, s.display_name.trim())
            .map_err(|e| HandlerErr::store("seedStudents", e))?;
        student_ids.push(id);
    }

    let mut event_type_ids = Vec::with_capacity(event_types.len());
    for t in event_types {
        let id = id_or_new(t.id);
        store
            .upsert_event_type(&id, t.name.trim(), t.category.trim(), t.default_points)
            .map_err(|e| HandlerErr::store("seedEventTypes", e))?;
        event_type_ids.push(id);
    }

    if let Some(classroom_id) = get_optional_str(params, "operatorClassroomId")? {
        store
            .set_operator_classroom(&classroom_id)
            .map_err(|e| HandlerErr::store("setOperatorClassroom", e))?;
    }

    Ok(json!({
        "classroomIds": classroom_ids,
        "studentIds": student_ids,
        "eventTypeIds": event_type_ids,
    }))
}

fn handle_store_seed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.stores.local.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    respond(&req.id, store_seed(store, &req.params))
}

fn with_store(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&dyn EventStore) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(store) = state.stores.active() else {
        return err(&req.id, "no_store", "select a workspace or connect a remote first", None);
    };
    respond(&req.id, f(store))
}

fn handle_classrooms_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store| {
        let classrooms = store
            .list_classrooms()
            .map_err(|e| HandlerErr::store("listClassrooms", e))?;
        Ok(json!({ "classrooms": classrooms }))
    })
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store| {
        let classroom_id = get_required_str(&req.params, "classroomId")?;
        let students = store
            .list_students(&classroom_id)
            .map_err(|e| HandlerErr::store("listStudents", e))?;
        Ok(json!({ "students": students }))
    })
}

fn handle_roster_mine(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store| {
        let roster = store
            .my_classroom_roster()
            .map_err(|e| HandlerErr::store("myClassroomRoster", e))?;
        Ok(json!({ "roster": roster }))
    })
}

fn handle_event_types_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_store(state, req, |store| {
        let event_types = store
            .list_event_types()
            .map_err(|e| HandlerErr::store("listEventTypes", e))?;
        Ok(json!({ "eventTypes": event_types }))
    })
}

fn handle_categories_list(_state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, Ok(json!({ "categories": describe_all() })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "store.seed" => Some(handle_store_seed(state, req)),
        "classrooms.list" => Some(handle_classrooms_list(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "roster.mine" => Some(handle_roster_mine(state, req)),
        "eventTypes.list" => Some(handle_event_types_list(state, req)),
        "categories.list" => Some(handle_categories_list(state, req)),
        _ => None,
    }
}
