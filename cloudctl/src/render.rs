//! # Output Rendering
//!
//! Prints an invocation result in the format selected with `-o`:
//!
//! * `yaml` (default): list results are printed one document per item, separated by `---`.
//! * `json`: pretty printed.
//! * `table`: a `comfy-table`, paged by `--page-size` unless `--no-paging` is set.
//! * `csv`: one row per list item, or `Field,Value` rows for a single object.
//!
//! Nested values inside table and CSV cells are written as compact JSON.
use cloudctl_core::options::{DEFAULT_PAGE_SIZE, FetchOptions, OutputFormat};
use cloudctl_core::postprocess::results;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::Write;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to encode CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Writes `value` to `out` as requested by `options`.
///
/// `minimal_columns`, when present, selects the columns of list results in table and CSV output.
pub fn render(
    out: &mut impl Write,
    value: &Value,
    options: &FetchOptions,
    minimal_columns: Option<&[String]>,
) -> Result<(), RenderError> {
    match options.output_format {
        OutputFormat::Yaml => render_yaml(out, value),
        OutputFormat::Json => render_json(out, value),
        OutputFormat::Csv => render_csv(out, value, &headers(value, options, minimal_columns)),
        OutputFormat::Table => {
            let columns = headers(value, options, minimal_columns);
            render_table(out, value, options, &columns)
        }
    }
}

/// Column headers of a list result: the minimal set, the requested columns, or every key found
/// on the items, sorted.
fn headers(
    value: &Value,
    options: &FetchOptions,
    minimal_columns: Option<&[String]>,
) -> Vec<String> {
    if let Some(columns) = minimal_columns {
        return columns.to_vec();
    }

    let requested = options.column_list();
    if !requested.is_empty() {
        return requested;
    }

    let keys: BTreeSet<&String> = results(value)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .flat_map(|item| item.keys())
        .collect();

    keys.into_iter().cloned().collect()
}

fn render_yaml(out: &mut impl Write, value: &Value) -> Result<(), RenderError> {
    match results(value) {
        Some(items) if !items.is_empty() => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    writeln!(out, "---")?;
                }
                write!(out, "{}", serde_yaml_ng::to_string(item)?)?;
            }
        }
        _ => write!(out, "{}", serde_yaml_ng::to_string(value)?)?,
    }
    Ok(())
}

fn render_json(out: &mut impl Write, value: &Value) -> Result<(), RenderError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn render_csv(out: &mut impl Write, value: &Value, headers: &[String]) -> Result<(), RenderError> {
    let mut writer = csv::Writer::from_writer(out);

    match results(value) {
        Some(items) => {
            writer.write_record(headers)?;
            for item in items {
                writer.write_record(headers.iter().map(|h| cell(item.get(h))))?;
            }
        }
        None => {
            writer.write_record(["Field", "Value"])?;
            if let Value::Object(fields) = value {
                for (key, field) in fields {
                    writer.write_record([key.clone(), cell(Some(field))])?;
                }
            }
        }
    }

    writer.flush()?;
    Ok(())
}

fn render_table(
    out: &mut impl Write,
    value: &Value,
    options: &FetchOptions,
    headers: &[String],
) -> Result<(), RenderError> {
    let Some(items) = results(value) else {
        let mut table = new_table();
        table.set_header(["Field", "Value"]);
        if let Value::Object(fields) = value {
            for (key, field) in fields {
                table.add_row([key.clone(), cell(Some(field))]);
            }
        }
        writeln!(out, "{table}")?;
        return Ok(());
    };

    if items.is_empty() {
        writeln!(out, "No results found")?;
        return Ok(());
    }

    let page_size = match (options.no_paging, options.page_size) {
        (true, _) => items.len(),
        (false, 0) => DEFAULT_PAGE_SIZE,
        (false, size) => size,
    };
    let pages = items.len().div_ceil(page_size);

    for (page, chunk) in items.chunks(page_size).enumerate() {
        let mut table = new_table();
        table.set_header(headers);
        for item in chunk {
            table.add_row(headers.iter().map(|h| cell(item.get(h))));
        }
        writeln!(out, "{table}")?;

        if pages > 1 {
            writeln!(out, "Page {}/{} ({} items)", page + 1, pages, items.len())?;
        }
    }

    Ok(())
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
