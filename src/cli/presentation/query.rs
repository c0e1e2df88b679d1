//! Query and explain presentation.

use super::cell;
use crate::execute::QueryResult;
use crate::service::{Explain, QueryResponse};
use crate::store::EntityRecord;
use comfy_table::Table;
use serde_json::json;
use std::collections::BTreeSet;

fn record_json(record: &EntityRecord) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    out.insert("key".to_string(), record.key.to_json());
    for (name, value) in &record.fields {
        out.insert(name.clone(), value.to_json());
    }
    serde_json::Value::Object(out)
}

fn records_table(rows: &[EntityRecord]) -> Table {
    let columns: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.fields.keys().map(String::as_str))
        .collect();
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    let mut header = vec!["Key"];
    header.extend(columns.iter().copied());
    table.set_header(header);
    for row in rows {
        let mut cells = vec![row.key_text()];
        cells.extend(columns.iter().map(|c| {
            row.fields
                .get(*c)
                .map(cell)
                .unwrap_or_else(|| "-".to_string())
        }));
        table.add_row(cells);
    }
    table
}

pub fn format_response_text(response: &QueryResponse) -> String {
    match &response.result {
        QueryResult::Count(n) => n.to_string(),
        QueryResult::Single(None) => "No entity found.".to_string(),
        QueryResult::Single(Some(record)) => records_table(std::slice::from_ref(record)).to_string(),
        QueryResult::List { rows, next_skip } => {
            if rows.is_empty() {
                return "No entities found.".to_string();
            }
            let mut output = records_table(rows).to_string();
            output.push_str(&format!("\n{} row(s)", rows.len()));
            if let Some(skip) = next_skip {
                output.push_str(&format!("; more results with --skip {}", skip));
            }
            output
        }
    }
}

pub fn format_response_json(response: &QueryResponse) -> String {
    let value = match &response.result {
        QueryResult::Count(n) => json!(n),
        QueryResult::Single(record) => record.as_ref().map(record_json).unwrap_or(json!(null)),
        QueryResult::List { rows, .. } => json!(rows.iter().map(record_json).collect::<Vec<_>>()),
    };
    let mut out = json!({
        "context": response.context_kind.as_str(),
        "value": value,
        "fingerprint": response.fingerprint,
    });
    if let QueryResult::List {
        next_skip: Some(skip),
        ..
    } = &response.result
    {
        out["next_skip"] = json!(skip);
    }
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_explain_text(explain: &Explain) -> String {
    let mut output = format!("Context:     {}\n", explain.context_kind);
    output.push_str(&format!(
        "Principal:   {}\n",
        explain.principal.as_deref().unwrap_or("(none)")
    ));
    output.push_str(&format!("Base:        {}\n", explain.base));
    match (&explain.filtered, &explain.fingerprint) {
        (Some(filtered), Some(fingerprint)) => {
            output.push_str(&format!("Filtered:    {}\n", filtered));
            output.push_str(&format!("Fingerprint: {}", fingerprint));
        }
        _ => output.push_str("Filtered:    (not executed; empty result without a principal)"),
    }
    output
}

pub fn format_explain_json(explain: &Explain) -> String {
    serde_json::to_string_pretty(explain).unwrap_or_else(|_| "{}".to_string())
}
