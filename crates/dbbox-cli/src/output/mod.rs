use dbbox_core::SqlValue;
use dbbox_db::QueryResult;
use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::ui;

pub mod table;

fn table_options() -> table::TableOptions {
    let prefs = ui::prefs();
    table::TableOptions {
        max_width: prefs.term_width,
        color: prefs.table_color,
    }
}

/// Render a serializable response to a string in the requested format.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Table => render_table(&serde_json::to_value(value)?),
        OutputFormat::Raw => Ok(serde_json::to_string(value)?),
    }
}

/// Print a serializable response in the requested format.
pub fn output<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = render(value, format)?;
    println!("{rendered}");
    Ok(())
}

/// Render query rows. Tables keep the column order of the result.
pub fn render_result(result: &QueryResult, format: OutputFormat) -> anyhow::Result<String> {
    if format != OutputFormat::Table {
        return render(result, format);
    }
    if result.is_empty() {
        return Ok(String::from("(no rows)"));
    }
    let headers = result
        .columns()
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>();
    let rows = result
        .iter()
        .map(|row| row.values().iter().map(sql_cell).collect())
        .collect::<Vec<Vec<String>>>();
    Ok(table::render_grid(&headers, &rows, table_options()))
}

pub fn output_result(result: &QueryResult, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = render_result(result, format)?;
    println!("{rendered}");
    Ok(())
}

fn render_table(value: &Value) -> anyhow::Result<String> {
    match value {
        Value::Array(items) => Ok(render_array_table(items)),
        Value::Object(map) => {
            let rows = map
                .iter()
                .map(|(key, value)| vec![key.clone(), value_to_cell(value)])
                .collect::<Vec<_>>();
            Ok(table::render_grid(&["key", "value"], &rows, table_options()))
        }
        scalar => Ok(value_to_cell(scalar)),
    }
}

fn render_array_table(items: &[Value]) -> String {
    if items.is_empty() {
        return String::from("(no rows)");
    }
    if !items.iter().all(Value::is_object) {
        let rows = items
            .iter()
            .map(|item| vec![value_to_cell(item)])
            .collect::<Vec<_>>();
        return table::render_grid(&["value"], &rows, table_options());
    }

    let mut headers = Vec::<&str>::new();
    for map in items.iter().filter_map(Value::as_object) {
        for key in map.keys() {
            if !headers.contains(&key.as_str()) {
                headers.push(key);
            }
        }
    }

    let rows = items
        .iter()
        .filter_map(Value::as_object)
        .map(|map| {
            headers
                .iter()
                .map(|header| map.get(*header).map_or_else(|| String::from("-"), value_to_cell))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    table::render_grid(&headers, &rows, table_options())
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("null"),
        Value::Bool(v) => v.to_string(),
        Value::Number(v) => v.to_string(),
        Value::String(v) => v.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| String::from("<invalid-json>")),
    }
}

/// Table cell text for a SQL value: text unquoted, NULL as `null`.
pub fn sql_cell(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => String::from("null"),
        SqlValue::Text(v) => v.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use dbbox_db::Column;
    use pretty_assertions::assert_eq;
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Example {
        table: &'static str,
        rows_affected: u64,
    }

    fn user_result() -> QueryResult {
        QueryResult::new(
            vec![Column::new("password", "VARCHAR"), Column::new("id", "INT")],
            vec![vec![SqlValue::from("pw1"), SqlValue::Int(1)], vec![
                SqlValue::Null,
                SqlValue::Int(2),
            ]],
        )
    }

    #[test]
    fn json_render_is_valid_json() {
        let value = Example {
            table: "user",
            rows_affected: 2,
        };
        let out = render(&value, OutputFormat::Json).expect("json render should work");
        let parsed: Value = serde_json::from_str(&out).expect("json should parse");
        assert_eq!(parsed["table"], "user");
        assert_eq!(parsed["rows_affected"], 2);
    }

    #[test]
    fn raw_render_is_single_line_json() {
        let out = render_result(&user_result(), OutputFormat::Raw).expect("raw render should work");
        assert!(!out.contains('\n'));
        let parsed: Value = serde_json::from_str(&out).expect("json should parse");
        assert_eq!(parsed[1]["password"], Value::Null);
    }

    #[test]
    fn result_table_keeps_column_order() {
        let out = render_result(&user_result(), OutputFormat::Table).expect("table render");
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("password"));
        assert!(lines[2].starts_with("pw1"));
        assert!(lines[3].starts_with("null"));
    }

    #[test]
    fn empty_result_table() {
        let out = render_result(&QueryResult::empty(), OutputFormat::Table).expect("table render");
        assert_eq!(out, "(no rows)");
    }

    #[test]
    fn object_renders_as_key_value_table() {
        let value = Example {
            table: "user",
            rows_affected: 2,
        };
        let out = render(&value, OutputFormat::Table).expect("table render should work");
        assert!(out.lines().next().is_some_and(|line| line.contains("key")));
        assert!(out.contains("rows_affected"));
    }

    #[test]
    fn sql_cells_are_unquoted() {
        assert_eq!(sql_cell(&SqlValue::from("pw1")), "pw1");
        assert_eq!(sql_cell(&SqlValue::Null), "null");
        assert_eq!(sql_cell(&SqlValue::Bool(true)), "true");
    }
}
