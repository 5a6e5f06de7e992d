//! `planner plan <command> [--flag value ...]`
//!
//! Plan commands are not clap subcommands: the command name and its flags
//! are resolved against the method registry, so every registered method is
//! reachable from the command line without a hand-written clap variant.

use crate::methods::{plan_methods, Ctx, Method, Param, ParamKind};
use crate::state_dir::resolve_state_dir;
use planner_core::{PlannerError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, PartialEq)]
pub struct PlanArgs {
    pub command: String,
    pub flags: Vec<(String, String)>,
    pub positional: Vec<String>,
    pub state_dir: Option<PathBuf>,
    pub json: bool,
}

/// Split raw trailing args into the command, its `--flag value` pairs and
/// the global options that may appear after the command.
pub fn parse_args(args: Vec<String>) -> Result<PlanArgs> {
    let mut iter = args.into_iter();
    let command = iter.next().ok_or_else(|| {
        PlannerError::InvalidParams(
            "missing plan command: run 'planner plan list-methods' to see them".to_string(),
        )
    })?;
    let mut parsed = PlanArgs {
        command,
        ..PlanArgs::default()
    };

    while let Some(arg) = iter.next() {
        if arg == "-j" {
            parsed.json = true;
            continue;
        }
        let Some(flag) = arg.strip_prefix("--") else {
            parsed.positional.push(arg);
            continue;
        };
        let (name, inline) = match flag.split_once('=') {
            Some((n, v)) => (n.to_string(), Some(v.to_string())),
            None => (flag.to_string(), None),
        };
        if name == "json" && inline.is_none() {
            parsed.json = true;
            continue;
        }
        let value = match inline {
            Some(v) => v,
            None => iter
                .next()
                .ok_or_else(|| PlannerError::InvalidParams(format!("--{name} needs a value")))?,
        };
        if name == "state-dir" {
            parsed.state_dir = Some(PathBuf::from(value));
        } else {
            parsed.flags.push((name, value));
        }
    }
    Ok(parsed)
}

/// Map `--some-flag value` pairs onto the method's declared params. A single
/// positional argument is accepted as `id` when the method takes one.
pub fn build_params(method: &dyn Method, args: &PlanArgs) -> Result<Value> {
    let mut map = Map::new();

    match args.positional.as_slice() {
        [] => {}
        [id] if method.param("id").is_some() => {
            map.insert("id".to_string(), Value::String(id.clone()));
        }
        extra => {
            return Err(PlannerError::InvalidParams(format!(
                "unexpected argument(s) for {}: {}",
                method.name(),
                extra.join(" ")
            )))
        }
    }

    for (flag, raw) in &args.flags {
        let key = flag.replace('-', "_");
        let param = method.param(&key).ok_or_else(|| {
            let known: Vec<String> = method
                .params()
                .iter()
                .map(|p| format!("--{}", p.name.replace('_', "-")))
                .collect();
            PlannerError::InvalidParams(format!(
                "unknown flag --{flag} for {}; known flags: {}",
                method.name(),
                if known.is_empty() { "none".to_string() } else { known.join(", ") }
            ))
        })?;
        map.insert(key, convert(param, flag, raw)?);
    }
    Ok(Value::Object(map))
}

fn convert(param: &Param, flag: &str, raw: &str) -> Result<Value> {
    let bad = |what: &str| PlannerError::InvalidParams(format!("--{flag} expects {what}, got '{raw}'"));
    match param.kind {
        ParamKind::String => Ok(Value::String(raw.to_string())),
        ParamKind::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| bad("an integer")),
        ParamKind::StringList if raw.trim_start().starts_with('[') => {
            serde_json::from_str(raw).map_err(|_| bad("a JSON array of strings"))
        }
        ParamKind::StringList => Ok(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        )),
        ParamKind::Json => serde_json::from_str(raw).map_err(|_| bad("JSON")),
    }
}

pub fn run(explicit_state_dir: Option<&Path>, args: Vec<String>, json: bool) -> anyhow::Result<()> {
    let args = parse_args(args)?;
    let state_dir = resolve_state_dir(args.state_dir.as_deref().or(explicit_state_dir));
    let methods = plan_methods();

    match args.command.as_str() {
        "list-methods" => super::list_methods(&methods, json || args.json),
        "batch" => {
            let [payload] = args.positional.as_slice() else {
                return Err(PlannerError::InvalidParams(
                    "batch takes exactly one argument: a JSON array of calls".to_string(),
                )
                .into());
            };
            let ctx = Ctx::load(&state_dir, None)?;
            super::run_batch(&methods, payload, &ctx)
        }
        name => {
            let method = crate::methods::find(&methods, name)
                .ok_or_else(|| PlannerError::MethodNotFound(name.to_string()))?;
            let params = build_params(method, &args)?;
            let ctx = Ctx::load(&state_dir, None)?;
            super::call_and_print(&methods, name, params, &ctx)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
