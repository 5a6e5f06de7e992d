use super::{optional, required, to_json, Ctx, FnMethod, Method, Param, ParamKind as Kind};
use planner_core::plan::ops::from_params;
use planner_core::qr::NewQrItem;
use planner_core::types::{QrStatus, Severity};
use planner_core::Result;
use serde::Deserialize;
use serde_json::Value;

const UPDATE_ITEM: &[Param] = &[
    required("id", Kind::String, "QR item id"),
    required("status", Kind::String, "PASS or FAIL"),
    optional("finding", Kind::String, "What failed; required with FAIL, forbidden with PASS"),
    optional("severity", Kind::String, "MUST, SHOULD or COULD"),
];

const ASSIGN_GROUP: &[Param] = &[
    required("id", Kind::String, "QR item id"),
    required("group_id", Kind::String, "Cluster tag"),
];

const ADD_ITEM: &[Param] = &[
    required("scope", Kind::String, "'*' for the whole artifact, or a locator"),
    required("check", Kind::String, "What to verify"),
    optional("severity", Kind::String, "MUST, SHOULD or COULD"),
    optional("id", Kind::String, "Explicit id; QR-NNN is assigned when absent"),
];

const LIST_ITEMS: &[Param] = &[optional("status", Kind::String, "Only items in this status")];

const BY_ID: &[Param] = &[required("id", Kind::String, "QR item id")];

const NONE: &[Param] = &[];

pub fn methods() -> Vec<Box<dyn Method>> {
    let table: Vec<FnMethod> = vec![
        FnMethod {
            name: "update-item",
            description: "Record PASS or FAIL for an item (PASS is final)",
            params: UPDATE_ITEM,
            handler: update_item,
        },
        FnMethod {
            name: "get-item",
            description: "Return one item",
            params: BY_ID,
            handler: get_item,
        },
        FnMethod {
            name: "list-items",
            description: "List items, optionally filtered by status",
            params: LIST_ITEMS,
            handler: list_items,
        },
        FnMethod {
            name: "summary",
            description: "Counts per status for the phase",
            params: NONE,
            handler: |_, ctx| to_json(&ctx.qr_store()?.summary()?),
        },
        FnMethod {
            name: "assign-group",
            description: "Tag an item with a group id (does not change its version)",
            params: ASSIGN_GROUP,
            handler: assign_group,
        },
        FnMethod {
            name: "add-item",
            description: "Append a TODO item, creating the phase file when needed",
            params: ADD_ITEM,
            handler: |p, ctx| to_json(&ctx.qr_store()?.add_item(from_params::<NewQrItem>(p)?)?),
        },
        FnMethod {
            name: "next-iteration",
            description: "Start the next review iteration",
            params: NONE,
            handler: |_, ctx| to_json(&ctx.qr_store()?.next_iteration()?),
        },
    ];
    table
        .into_iter()
        .map(|m| Box::new(m) as Box<dyn Method>)
        .collect()
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateItem {
    id: String,
    status: QrStatus,
    finding: Option<String>,
    severity: Option<Severity>,
}

fn update_item(params: Value, ctx: &Ctx) -> Result<Value> {
    let req: UpdateItem = from_params(params)?;
    let item = ctx
        .qr_store()?
        .update_item(&req.id, req.status, req.finding, req.severity)?;
    to_json(&item)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ById {
    id: String,
}

fn get_item(params: Value, ctx: &Ctx) -> Result<Value> {
    let req: ById = from_params(params)?;
    to_json(&ctx.qr_store()?.get_item(&req.id)?)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListItems {
    status: Option<QrStatus>,
}

fn list_items(params: Value, ctx: &Ctx) -> Result<Value> {
    let req: ListItems = from_params(params)?;
    to_json(&ctx.qr_store()?.list_items(req.status)?)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AssignGroup {
    id: String,
    group_id: String,
}

fn assign_group(params: Value, ctx: &Ctx) -> Result<Value> {
    let req: AssignGroup = from_params(params)?;
    to_json(&ctx.qr_store()?.assign_group(&req.id, &req.group_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::find;
    use planner_core::PlannerError;
    use serde_json::json;
    use tempfile::TempDir;

    fn call(ctx: &Ctx, name: &str, params: Value) -> Result<Value> {
        let methods = methods();
        find(&methods, name).unwrap().call(params, ctx)
    }

    fn ctx(dir: &TempDir) -> Ctx {
        Ctx::load(dir.path(), Some("plan-code".into())).unwrap()
    }

    #[test]
    fn add_update_summary() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(&dir);
        let item = call(&ctx, "add-item", json!({"scope": "*", "check": "c"})).unwrap();
        assert_eq!(item["id"], "QR-001");

        let item = call(
            &ctx,
            "update-item",
            json!({"id": "QR-001", "status": "FAIL", "finding": "x"}),
        )
        .unwrap();
        assert_eq!(item["finding"], "x");
        assert_eq!(item["version"], 2);

        let summary = call(&ctx, "summary", json!({})).unwrap();
        assert_eq!(summary["fail"], 1);
        assert_eq!(summary["complete"], false);
    }

    #[test]
    fn status_must_be_known_name() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(&dir);
        call(&ctx, "add-item", json!({"scope": "*", "check": "c"})).unwrap();
        let err = call(&ctx, "update-item", json!({"id": "QR-001", "status": "DONE"}))
            .unwrap_err();
        assert!(matches!(err, PlannerError::Schema(_)));
    }

    #[test]
    fn status_and_severity_ignore_case_like_the_cli() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(&dir);
        call(&ctx, "add-item", json!({"scope": "*", "check": "c", "severity": "must"})).unwrap();
        let item = call(
            &ctx,
            "update-item",
            json!({"id": "QR-001", "status": "fail", "finding": "x"}),
        )
        .unwrap();
        assert_eq!(item["status"], "FAIL");
        assert_eq!(item["severity"], "MUST");

        let failing = call(&ctx, "list-items", json!({"status": "Fail"})).unwrap();
        assert_eq!(failing.as_array().unwrap().len(), 1);
    }

    #[test]
    fn list_items_filters() {
        let dir = TempDir::new().unwrap();
        let ctx = ctx(&dir);
        call(&ctx, "add-item", json!({"scope": "*", "check": "a"})).unwrap();
        call(&ctx, "add-item", json!({"scope": "M-001", "check": "b", "severity": "MUST"}))
            .unwrap();
        call(&ctx, "update-item", json!({"id": "QR-002", "status": "PASS"})).unwrap();

        let todo = call(&ctx, "list-items", json!({"status": "TODO"})).unwrap();
        assert_eq!(todo.as_array().unwrap().len(), 1);
        let all = call(&ctx, "list-items", json!({})).unwrap();
        assert_eq!(all.as_array().unwrap().len(), 2);
    }
}
