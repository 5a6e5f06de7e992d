use crate::rpc::ErrorObject;
use planner_core::PlannerError;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Machine-readable error block on stdout, so callers parsing stdout see the
/// failure in the same channel as results.
pub fn print_error(err: &PlannerError) -> anyhow::Result<()> {
    print_json(&serde_json::json!({ "error": ErrorObject::from(err) }))
}

/// Left-aligned columns separated by two spaces. The last column is not
/// padded, so long descriptions don't drag trailing whitespace.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", render_row(&header, &widths));
    println!("{}", render_row(&rule, &widths));
    for row in &rows {
        println!("{}", render_row(row, &widths));
    }
}

fn render_row(cells: &[String], widths: &[usize]) -> String {
    let last = cells.len().saturating_sub(1);
    cells
        .iter()
        .enumerate()
        .map(|(i, cell)| match widths.get(i) {
            Some(&w) if i < last => format!("{cell:<w$}"),
            _ => cell.clone(),
        })
        .collect::<Vec<_>>()
        .join("  ")
}
