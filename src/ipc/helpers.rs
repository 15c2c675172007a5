use crate::ipc::error::{err, ok};
use crate::period::{Period, PeriodError};
use crate::store::StoreError;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::warn;

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr::new("bad_params", message)
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    /// Store failure outside a workflow commit.
    pub fn store(action: &'static str, e: StoreError) -> Self {
        warn!(action, error = %e, "store call failed");
        HandlerErr {
            code: "remote_call_failed",
            message: e.to_string(),
            details: Some(store_details(action, None, &e)),
        }
    }

    pub fn internal(code: &'static str, e: anyhow::Error) -> Self {
        HandlerErr::new(code, format!("{e:#}"))
    }
}

fn store_details(action: &str, period: Option<u8>, e: &StoreError) -> serde_json::Value {
    let mut d = json!({ "action": action, "period": period });
    if let StoreError::Status { status, .. } = e {
        d["status"] = json!(status);
    }
    d
}

impl From<PeriodError> for HandlerErr {
    fn from(e: PeriodError) -> Self {
        let message = e.to_string();
        match e {
            PeriodError::InvalidPeriod(_)
            | PeriodError::InvalidDate(_)
            | PeriodError::RowOutOfRange { .. } => HandlerErr::bad_params(message),
            PeriodError::ReadOnly => HandlerErr::new("read_only", message),
            PeriodError::EditInProgress(period) => HandlerErr {
                code: "edit_in_progress",
                message,
                details: Some(json!({ "editingPeriod": period })),
            },
            PeriodError::NotEditing => HandlerErr::new("not_editing", message),
            PeriodError::PeriodLocked { period, editing } => HandlerErr {
                code: "period_locked",
                message,
                details: Some(json!({ "period": period, "editingPeriod": editing })),
            },
            PeriodError::WrongMode { .. } => HandlerErr::new("wrong_mode", message),
            PeriodError::IncompleteSubmission => HandlerErr::new("incomplete_submission", message),
            PeriodError::RemoteCallFailure {
                action,
                period,
                source,
            } => HandlerErr {
                code: "remote_call_failed",
                message,
                details: Some(store_details(action, period, &source)),
            },
            PeriodError::PartialBatchFailure(summary) => HandlerErr {
                code: "partial_batch_failure",
                message,
                details: serde_json::to_value(&summary).ok(),
            },
        }
    }
}

pub fn respond(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Absent, null and blank strings all read as `None`.
pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => {
            let t = s.trim();
            Ok((!t.is_empty()).then(|| t.to_string()))
        }
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_period(params: &serde_json::Value) -> Result<Period, HandlerErr> {
    let n = get_required_i64(params, "period")?;
    Ok(Period::new(n)?)
}

pub fn get_optional_period(params: &serde_json::Value) -> Result<Option<Period>, HandlerErr> {
    match params.get("period") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(_) => get_period(params).map(Some),
    }
}

pub fn get_index(params: &serde_json::Value) -> Result<usize, HandlerErr> {
    let n = get_required_i64(params, "index")?;
    usize::try_from(n).map_err(|_| HandlerErr::bad_params("index must not be negative"))
}

/// Deserializes `params[key]` into a typed value such as a category enum.
pub fn get_typed<T: DeserializeOwned>(params: &serde_json::Value, key: &str) -> Result<T, HandlerErr> {
    let v = params
        .get(key)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    serde_json::from_value(v.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::catalog::PointColumn;

    #[test]
    fn optional_strings_treat_blank_as_absent() {
        let p = json!({ "a": "  ", "b": null, "c": " x ", "d": 3 });
        assert_eq!(get_optional_str(&p, "a").ok().flatten(), None);
        assert_eq!(get_optional_str(&p, "b").ok().flatten(), None);
        assert_eq!(get_optional_str(&p, "c").ok().flatten().as_deref(), Some("x"));
        assert!(get_optional_str(&p, "d").is_err());
        assert!(get_optional_str(&p, "zz").expect("absent").is_none());
    }

    #[test]
    fn period_and_enum_params() {
        assert_eq!(get_period(&json!({ "period": 7 })).ok().map(Period::get), Some(7));
        let e = get_period(&json!({ "period": 8 })).err().expect("out of range");
        assert_eq!(e.code, "bad_params");
        let column: PointColumn = get_typed(&json!({ "column": "score9" }), "column").ok().expect("column");
        assert_eq!(column, PointColumn::Score9);
        assert!(get_typed::<PointColumn>(&json!({ "column": "score11" }), "column").is_err());
        assert!(get_index(&json!({ "index": -1 })).is_err());
    }

    #[test]
    fn period_errors_map_to_codes() {
        let cases: Vec<(PeriodError, &str)> = vec![
            (PeriodError::ReadOnly, "read_only"),
            (PeriodError::EditInProgress(3), "edit_in_progress"),
            (PeriodError::NotEditing, "not_editing"),
            (PeriodError::PeriodLocked { period: 2, editing: 3 }, "period_locked"),
            (PeriodError::IncompleteSubmission, "incomplete_submission"),
            (PeriodError::InvalidDate("x".to_string()), "bad_params"),
            (
                PeriodError::remote(
                    "listEvents",
                    None,
                    StoreError::Status {
                        status: 502,
                        body: "bad gateway".to_string(),
                    },
                ),
                "remote_call_failed",
            ),
        ];
        for (e, code) in cases {
            assert_eq!(HandlerErr::from(e).code, code);
        }
    }
}
