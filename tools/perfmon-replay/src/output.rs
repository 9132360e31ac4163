//! Table and JSON rendering of replay results

use crate::replay::ReplayOutput;
use anyhow::Result;
use colored::*;
use perfmon_calc::TypedValue;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Column indices whose names match `filter` (all columns without one)
pub fn select_columns(columns: &[String], filter: Option<&Regex>) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .filter(|(_, name)| match filter {
            Some(re) => re.is_match(name),
            None => true,
        })
        .map(|(i, _)| i)
        .collect()
}

pub fn to_json_value(value: &TypedValue) -> Value {
    match value {
        TypedValue::Bool(b) => Value::Bool(*b),
        TypedValue::U32(v) => Value::from(*v),
        TypedValue::U64(v) => Value::from(*v),
        TypedValue::F32(v) => serde_json::Number::from_f64(f64::from(*v))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        TypedValue::ByteArray(_) => Value::String(value.to_string()),
    }
}

#[derive(Debug, Serialize)]
struct JsonReport {
    report: usize,
    values: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_values: Option<Map<String, Value>>,
}

fn named(columns: &[String], row: &[TypedValue], selected: &[usize]) -> Map<String, Value> {
    selected
        .iter()
        .filter_map(|&i| Some((columns.get(i)?.clone(), to_json_value(row.get(i)?))))
        .collect()
}

pub fn render_json(output: &ReplayOutput, selected: &[usize]) -> Result<String> {
    let reports: Vec<JsonReport> = output
        .rows
        .iter()
        .enumerate()
        .map(|(report, row)| JsonReport {
            report,
            values: named(&output.columns, row, selected),
            max_values: output
                .max_rows
                .as_ref()
                .and_then(|rows| rows.get(report))
                .map(|max| named(&output.columns, max, selected)),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&reports)?)
}

/// Plain-text table; colors only apply when the terminal supports them
pub fn render_table(output: &ReplayOutput, selected: &[usize]) -> String {
    let cells: Vec<Vec<String>> = output
        .rows
        .iter()
        .map(|row| {
            selected
                .iter()
                .map(|&i| row.get(i).map(ToString::to_string).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = selected
        .iter()
        .enumerate()
        .map(|(col, &i)| {
            let header = output.columns.get(i).map_or(0, String::len);
            cells
                .iter()
                .map(|row| row[col].len())
                .fold(header, usize::max)
        })
        .collect();

    let mut text = String::new();
    let header: Vec<String> = selected
        .iter()
        .zip(&widths)
        .map(|(&i, &w)| format!("{:>w$}", output.columns[i], w = w))
        .collect();
    text.push_str(&format!("{:>6}  {}\n", "#".bold(), header.join("  ").bold()));

    for (report, row) in cells.iter().enumerate() {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:>w$}", cell, w = w))
            .collect();
        text.push_str(&format!("{:>6}  {}\n", report.to_string().dimmed(), line.join("  ")));
    }

    text.push_str(&format!(
        "{} {} calculated from {} raw reports\n",
        "Done:".green(),
        output.rows.len(),
        output.raw_reports
    ));
    text
}
