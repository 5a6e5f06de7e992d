use crate::methods::{Ctx, Method};
use crate::output::{print_json, print_table};
use crate::rpc;
use serde_json::Value;

pub mod config;
pub mod plan;
pub mod qr;

// ---------------------------------------------------------------------------
// Shared runners for the plan and qr command groups
// ---------------------------------------------------------------------------

fn call_and_print(
    methods: &[Box<dyn Method>],
    name: &str,
    params: Value,
    ctx: &Ctx,
) -> anyhow::Result<()> {
    let result = rpc::dispatch(methods, name, params, ctx)?;
    print_json(&result)
}

/// Print every response, then fail the process when any call failed.
fn run_batch(methods: &[Box<dyn Method>], payload: &str, ctx: &Ctx) -> anyhow::Result<()> {
    let responses = rpc::batch(methods, payload, ctx)?;
    print_json(&responses)?;
    let failed = responses.iter().filter(|r| r.is_error()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} batch calls failed", responses.len());
    }
    Ok(())
}

fn list_methods(methods: &[Box<dyn Method>], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&crate::methods::describe(methods));
    }
    let rows = methods
        .iter()
        .map(|m| {
            let params: Vec<String> = m
                .params()
                .iter()
                .map(|p| {
                    let flag = p.name.replace('_', "-");
                    if p.required {
                        format!("--{flag}")
                    } else {
                        format!("[--{flag}]")
                    }
                })
                .collect();
            vec![
                m.name().to_string(),
                params.join(" "),
                m.description().to_string(),
            ]
        })
        .collect();
    print_table(&["METHOD", "PARAMS", "DESCRIPTION"], rows);
    Ok(())
}
