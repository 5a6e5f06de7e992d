use crate::methods::{find, Ctx, Method};
use planner_core::{PlannerError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl BatchResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorObject {
    pub code: i32,
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<&PlannerError> for ErrorObject {
    fn from(e: &PlannerError) -> Self {
        Self {
            code: e.code(),
            kind: e.kind(),
            message: e.to_string(),
            data: e.data(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Resolve `name`, check its required params and call it.
pub fn dispatch(
    methods: &[Box<dyn Method>],
    name: &str,
    params: Value,
    ctx: &Ctx,
) -> Result<Value> {
    let method = find(methods, name).ok_or_else(|| PlannerError::MethodNotFound(name.to_string()))?;

    let params = match params {
        Value::Null => Value::Object(Default::default()),
        Value::Object(map) => Value::Object(map),
        other => {
            return Err(PlannerError::InvalidParams(format!(
                "params for {name} must be a JSON object, got {other}"
            )))
        }
    };

    let missing: Vec<String> = method
        .params()
        .iter()
        .filter(|p| p.required && params.get(p.name).is_none_or(Value::is_null))
        .map(|p| p.name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PlannerError::MissingParams {
            method: name.to_string(),
            missing,
        });
    }

    tracing::debug!(method = name, "dispatch");
    method.call(params, ctx)
}

/// Run a JSON array of `{method, params, id}` calls in order. Each entry gets
/// its own response; a failing entry never stops the ones after it. Only a
/// payload that is not a JSON array fails as a whole.
pub fn batch(methods: &[Box<dyn Method>], payload: &str, ctx: &Ctx) -> Result<Vec<BatchResponse>> {
    let raw: Value = serde_json::from_str(payload).map_err(|e| PlannerError::Parse {
        origin: "batch payload".to_string(),
        message: e.to_string(),
    })?;
    let Value::Array(entries) = raw else {
        return Err(PlannerError::InvalidParams(
            "batch payload must be a JSON array of {method, params, id} objects".to_string(),
        ));
    };

    let responses: Vec<BatchResponse> = entries
        .into_iter()
        .map(|entry| run_entry(methods, entry, ctx))
        .collect();
    let failed = responses.iter().filter(|r| r.is_error()).count();
    tracing::debug!(total = responses.len(), failed, "batch finished");
    Ok(responses)
}

fn run_entry(methods: &[Box<dyn Method>], entry: Value, ctx: &Ctx) -> BatchResponse {
    let id = entry.get("id").cloned().unwrap_or(Value::Null);
    let outcome = serde_json::from_value::<BatchRequest>(entry)
        .map_err(|e| PlannerError::InvalidParams(format!("malformed batch entry: {e}")))
        .and_then(|req| dispatch(methods, &req.method, req.params, ctx));
    match outcome {
        Ok(result) => BatchResponse {
            id,
            result: Some(result),
            error: None,
        },
        Err(e) => BatchResponse {
            id,
            result: None,
            error: Some(ErrorObject::from(&e)),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
