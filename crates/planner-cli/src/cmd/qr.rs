use crate::methods::{qr_methods, Ctx};
use clap::Subcommand;
use planner_core::types::{QrStatus, Severity};
use serde_json::{json, Value};
use std::path::Path;

#[derive(Subcommand)]
pub enum QrSubcommand {
    /// Record a verification result for an item
    UpdateItem {
        id: String,
        /// PASS or FAIL
        #[arg(long)]
        status: String,
        /// What failed (required with FAIL, rejected with PASS)
        #[arg(long)]
        finding: Option<String>,
        /// MUST, SHOULD or COULD
        #[arg(long)]
        severity: Option<String>,
    },
    /// Show one item
    GetItem { id: String },
    /// List items
    ListItems {
        /// Only items in this status: TODO, PASS or FAIL
        #[arg(long)]
        status: Option<String>,
    },
    /// Counts per status
    Summary,
    /// Tag an item with a group id
    AssignGroup {
        id: String,
        #[arg(long)]
        group_id: String,
    },
    /// Append a TODO item
    AddItem {
        /// '*' for the whole artifact, or a locator such as M-001
        #[arg(long)]
        scope: String,
        /// What to verify
        #[arg(long)]
        check: String,
        /// MUST, SHOULD or COULD (default from config.yaml)
        #[arg(long)]
        severity: Option<String>,
        /// Explicit item id (default: next QR-NNN)
        #[arg(long)]
        id: Option<String>,
    },
    /// Start the next review iteration
    NextIteration,
    /// Run a JSON array of {method, params, id} calls
    Batch { payload: String },
    /// List the QR methods and their params
    ListMethods,
}

pub fn run(
    state_dir: &Path,
    phase: Option<String>,
    subcmd: QrSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let methods = qr_methods();
    let (name, params) = match subcmd {
        QrSubcommand::ListMethods => return super::list_methods(&methods, json),
        QrSubcommand::Batch { payload } => {
            let ctx = Ctx::load(state_dir, phase)?;
            return super::run_batch(&methods, &payload, &ctx);
        }
        QrSubcommand::UpdateItem {
            id,
            status,
            finding,
            severity,
        } => (
            "update-item",
            json!({
                "id": id,
                "status": status.parse::<QrStatus>()?.as_str(),
                "finding": finding,
                "severity": parse_severity(severity)?,
            }),
        ),
        QrSubcommand::GetItem { id } => ("get-item", json!({ "id": id })),
        QrSubcommand::ListItems { status } => {
            let status = status.map(|s| s.parse::<QrStatus>()).transpose()?;
            ("list-items", json!({ "status": status }))
        }
        QrSubcommand::Summary => ("summary", json!({})),
        QrSubcommand::AssignGroup { id, group_id } => {
            ("assign-group", json!({ "id": id, "group_id": group_id }))
        }
        QrSubcommand::AddItem {
            scope,
            check,
            severity,
            id,
        } => (
            "add-item",
            json!({
                "scope": scope,
                "check": check,
                "severity": parse_severity(severity)?,
                "id": id,
            }),
        ),
        QrSubcommand::NextIteration => ("next-iteration", json!({})),
    };
    let ctx = Ctx::load(state_dir, phase)?;
    super::call_and_print(&methods, name, params, &ctx)
}

fn parse_severity(raw: Option<String>) -> planner_core::Result<Value> {
    Ok(match raw {
        Some(s) => Value::from(s.parse::<Severity>()?.as_str()),
        None => Value::Null,
    })
}
