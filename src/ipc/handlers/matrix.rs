use crate::ipc::helpers::{
    get_index, get_optional_period, get_optional_str, get_period, get_required_i64, get_typed, respond,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::period::catalog::{ClassViolation, LessonRating, PointColumn, StudentViolation};
use crate::period::matrix::{PeriodMatrixStore, PointRow, StudentViolationRow};
use crate::period::workflow::Session;
use crate::period::Period;
use serde_json::json;

fn no_session() -> HandlerErr {
    HandlerErr::new("no_session", "open a session first")
}

/// Runs one mutation against the period named in `params` and answers with
/// that period's entry. `f` may return extra data under `result`.
fn mutate(
    state: &mut AppState,
    params: &serde_json::Value,
    f: impl FnOnce(&mut PeriodMatrixStore, Period) -> Result<serde_json::Value, HandlerErr>,
) -> Result<serde_json::Value, HandlerErr> {
    let session = state.session.as_mut().ok_or_else(no_session)?;
    let period = get_period(params)?;
    let extra = f(session.matrix_mut(period)?, period)?;
    Ok(entry_json(session, period, extra))
}

fn entry_json(session: &Session, period: Period, extra: serde_json::Value) -> serde_json::Value {
    let mut out = json!({
        "period": period,
        "entry": session.matrix().entry(period),
    });
    if !extra.is_null() {
        out["result"] = extra;
    }
    out
}

fn point_row(params: &serde_json::Value) -> Result<PointRow, HandlerErr> {
    Ok(PointRow::new(
        get_optional_str(params, "studentId")?,
        get_optional_str(params, "note")?,
    ))
}

fn student_violation_kind(params: &serde_json::Value) -> Result<StudentViolation, HandlerErr> {
    get_typed(params, "kind")
}

fn add_point_row(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let column: PointColumn = get_typed(params, "column")?;
    let row = point_row(params)?;
    mutate(state, params, |m, p| {
        let index = m.add_point_row(p, column, row);
        Ok(json!({ "index": index }))
    })
}

fn update_point_row(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let column: PointColumn = get_typed(params, "column")?;
    let index = get_index(params)?;
    let row = point_row(params)?;
    mutate(state, params, |m, p| {
        m.update_point_row(p, column, index, row)?;
        Ok(serde_json::Value::Null)
    })
}

fn remove_point_row(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let column: PointColumn = get_typed(params, "column")?;
    let index = get_index(params)?;
    mutate(state, params, |m, p| {
        let removed = m.remove_point_row(p, column, index)?;
        Ok(json!({ "removed": removed }))
    })
}

fn select_lesson_rating(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let rating: Option<LessonRating> = match params.get("rating") {
        None => return Err(HandlerErr::bad_params("missing rating")),
        Some(serde_json::Value::Null) => None,
        Some(_) => Some(get_typed(params, "rating")?),
    };
    mutate(state, params, |m, p| {
        m.select_lesson_rating(p, rating);
        Ok(serde_json::Value::Null)
    })
}

fn adjust_class_violation(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let kind: ClassViolation = get_typed(params, "kind")?;
    let delta = get_required_i64(params, "delta")?;
    mutate(state, params, |m, p| {
        let count = m.adjust_class_violation(p, kind, delta);
        Ok(json!({ "count": count }))
    })
}

fn set_class_violation(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let kind: ClassViolation = get_typed(params, "kind")?;
    let count = get_required_i64(params, "count")?;
    let count = u32::try_from(count).map_err(|_| HandlerErr::bad_params("count must not be negative"))?;
    mutate(state, params, |m, p| {
        m.set_class_violation(p, kind, count);
        Ok(json!({ "count": count }))
    })
}

fn add_student_violation_row(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let row = StudentViolationRow {
        student_id: get_optional_str(params, "studentId")?,
        kind: student_violation_kind(params)?,
    };
    mutate(state, params, |m, p| {
        let index = m.add_student_violation_row(p, row);
        Ok(json!({ "index": index }))
    })
}

fn update_student_violation_row(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let index = get_index(params)?;
    let row = StudentViolationRow {
        student_id: get_optional_str(params, "studentId")?,
        kind: student_violation_kind(params)?,
    };
    mutate(state, params, |m, p| {
        m.update_student_violation_row(p, index, row)?;
        Ok(serde_json::Value::Null)
    })
}

fn remove_student_violation_row(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let index = get_index(params)?;
    mutate(state, params, |m, p| {
        let removed = m.remove_student_violation_row(p, index)?;
        Ok(json!({ "removed": removed }))
    })
}

fn clear_period(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    mutate(state, params, |m, p| {
        m.clear_period(p);
        Ok(serde_json::Value::Null)
    })
}

fn preview(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session = state.session.as_ref().ok_or_else(no_session)?;
    let periods: Vec<serde_json::Value> = match get_optional_period(params)? {
        Some(p) => vec![json!({ "period": p, "output": session.preview(p) })],
        None => session
            .preview_all()
            .into_iter()
            .map(|(p, output)| json!({ "period": p, "output": output }))
            .collect(),
    };
    Ok(json!({ "periods": periods }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "matrix.addPointRow" => add_point_row(state, &req.params),
        "matrix.updatePointRow" => update_point_row(state, &req.params),
        "matrix.removePointRow" => remove_point_row(state, &req.params),
        "matrix.selectLessonRating" => select_lesson_rating(state, &req.params),
        "matrix.adjustClassViolation" => adjust_class_violation(state, &req.params),
        "matrix.setClassViolation" => set_class_violation(state, &req.params),
        "matrix.addStudentViolationRow" => add_student_violation_row(state, &req.params),
        "matrix.updateStudentViolationRow" => update_student_violation_row(state, &req.params),
        "matrix.removeStudentViolationRow" => remove_student_violation_row(state, &req.params),
        "matrix.clearPeriod" => clear_period(state, &req.params),
        "matrix.preview" => preview(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
