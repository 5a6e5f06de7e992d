//! Explicit registries of the callable plan and QR methods.
//!
//! Every method declares its parameters up front, which drives the CLI flag
//! mapping, the required-param check in [`crate::rpc::dispatch`] and the
//! `list-methods` schema output.

use planner_core::config::Config;
use planner_core::plan::PlanStore;
use planner_core::qr::QrStore;
use planner_core::{PlannerError, Result};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

pub mod plan;
pub mod qr;

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    /// Comma-separated on the command line, a JSON array in batches.
    StringList,
    /// Arbitrary JSON, parsed from the flag value.
    Json,
}

impl ParamKind {
    fn json_type(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::StringList => "array",
            ParamKind::Json => "object",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub help: &'static str,
}

pub const fn required(name: &'static str, kind: ParamKind, help: &'static str) -> Param {
    Param {
        name,
        kind,
        required: true,
        help,
    }
}

pub const fn optional(name: &'static str, kind: ParamKind, help: &'static str) -> Param {
    Param {
        name,
        kind,
        required: false,
        help,
    }
}

// ---------------------------------------------------------------------------
// Ctx
// ---------------------------------------------------------------------------

/// Everything a method call needs besides its params.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub state_dir: PathBuf,
    pub config: Config,
    pub qr_phase: Option<String>,
}

impl Ctx {
    pub fn load(state_dir: &Path, qr_phase: Option<String>) -> Result<Self> {
        Ok(Self {
            state_dir: state_dir.to_path_buf(),
            config: Config::load(state_dir)?,
            qr_phase,
        })
    }

    pub fn plan_store(&self) -> PlanStore {
        PlanStore::new(&self.state_dir)
    }

    pub fn qr_store(&self) -> Result<QrStore> {
        let phase = self.qr_phase.as_deref().ok_or_else(|| {
            PlannerError::InvalidParams("--qr-phase is required for QR methods".to_string())
        })?;
        QrStore::new(&self.state_dir, phase, &self.config)
    }
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

pub trait Method: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn params(&self) -> &[Param];
    fn call(&self, params: Value, ctx: &Ctx) -> Result<Value>;

    fn param(&self, name: &str) -> Option<&Param> {
        self.params().iter().find(|p| p.name == name)
    }

    /// JSON-schema style description of the accepted params.
    fn schema(&self) -> Value {
        let mut properties = Map::new();
        for p in self.params() {
            let mut prop = json!({
                "type": p.kind.json_type(),
                "description": p.help,
            });
            if p.kind == ParamKind::StringList {
                prop["items"] = json!({ "type": "string" });
            }
            properties.insert(p.name.to_string(), prop);
        }
        let required: Vec<&str> = self
            .params()
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

pub type Handler = fn(Value, &Ctx) -> Result<Value>;

/// A method backed by a plain handler function.
pub struct FnMethod {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [Param],
    pub handler: Handler,
}

impl Method for FnMethod {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn params(&self) -> &[Param] {
        self.params
    }

    fn call(&self, params: Value, ctx: &Ctx) -> Result<Value> {
        (self.handler)(params, ctx)
    }
}

pub fn plan_methods() -> Vec<Box<dyn Method>> {
    plan::methods()
}

pub fn qr_methods() -> Vec<Box<dyn Method>> {
    qr::methods()
}

pub fn find<'a>(methods: &'a [Box<dyn Method>], name: &str) -> Option<&'a dyn Method> {
    methods.iter().find(|m| m.name() == name).map(|m| m.as_ref())
}

/// `list-methods` output: name, description and input schema, in
/// registration order.
pub fn describe(methods: &[Box<dyn Method>]) -> Value {
    Value::Array(
        methods
            .iter()
            .map(|m| {
                json!({
                    "name": m.name(),
                    "description": m.description(),
                    "inputSchema": m.schema(),
                })
            })
            .collect(),
    )
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn method_names_are_unique_and_hyphenated() {
        for methods in [plan_methods(), qr_methods()] {
            let mut seen = HashSet::new();
            for m in &methods {
                assert!(seen.insert(m.name().to_string()), "duplicate {}", m.name());
                assert!(!m.name().contains('_'), "{} should be hyphenated", m.name());
                assert!(!m.description().is_empty());
            }
        }
    }

    #[test]
    fn schema_lists_required_params() {
        let methods = plan_methods();
        let m = find(&methods, "add-diagram-edge").unwrap();
        let schema = m.schema();
        assert_eq!(schema["required"], json!(["diagram", "source", "target"]));
        assert_eq!(schema["properties"]["label"]["type"], "string");
    }

    #[test]
    fn list_params_are_arrays_of_strings() {
        let methods = plan_methods();
        let schema = find(&methods, "set-intent").unwrap().schema();
        assert_eq!(schema["properties"]["decision_refs"]["type"], "array");
        assert_eq!(schema["properties"]["decision_refs"]["items"]["type"], "string");
    }

    #[test]
    fn qr_store_needs_a_phase() {
        let ctx = Ctx {
            state_dir: PathBuf::from("."),
            config: Config::default(),
            qr_phase: None,
        };
        assert!(matches!(
            ctx.qr_store().unwrap_err(),
            PlannerError::InvalidParams(_)
        ));
    }

    #[test]
    fn describe_keeps_registration_order() {
        let methods = qr_methods();
        let described = describe(&methods);
        let names: Vec<&str> = described
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["name"].as_str().unwrap())
            .collect();
        assert_eq!(names[0], "update-item");
        assert_eq!(names.len(), methods.len());
    }
}
