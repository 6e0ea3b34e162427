//! Table rows as read out of the live page.

use crate::error::{AppError, Result};
use serde::Deserialize;
use serde_json::Value;

/// One cell of an extracted table.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TableCell {
    /// The cell's rendered `innerText`.
    pub text: String,
    /// The cell's CSS classes.
    pub classes: Vec<String>,
}

impl TableCell {
    pub(crate) fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// One row of an extracted table, cells in document order.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TableRow {
    pub cells: Vec<TableCell>,
}

/// Builds the page script that serializes every row of the first table
/// matching `table_selector`, or returns `null` when there is none.
///
/// Text comes from `innerText` so line breaks follow the rendered layout
/// rather than the markup.
pub(crate) fn table_rows_script(table_selector: &str) -> Result<String> {
    let selector = serde_json::to_string(table_selector)?;
    Ok(format!(
        r#"(() => {{
  const table = document.querySelector({selector});
  if (!table) return null;
  return JSON.stringify([...table.rows].map((row) => ({{
    cells: [...row.cells].map((cell) => ({{
      text: cell.innerText,
      classes: [...cell.classList]
    }}))
  }})));
}})()"#
    ))
}

/// Decodes what [`table_rows_script`] evaluated to.
///
/// # Arguments
/// * `value` - The script result; `None` or `null` when the table is absent.
/// * `table_selector` - Used for the error when the table is missing.
pub(crate) fn rows_from_script_result(
    value: Option<Value>,
    table_selector: &str,
) -> Result<Vec<TableRow>> {
    match value {
        None | Some(Value::Null) => Err(AppError::SelectorNotFound(table_selector.to_string())),
        Some(Value::String(json)) => {
            let rows: Vec<TableRow> = serde_json::from_str(&json).map_err(|e| {
                AppError::MalformedTable(format!("unreadable rows for '{}': {}", table_selector, e))
            })?;
            tracing::debug!(target: "scrape_task", "Extracted {} rows from '{}'", rows.len(), table_selector);
            Ok(rows)
        }
        Some(other) => Err(AppError::MalformedTable(format!(
            "expected serialized rows for '{}', got {}",
            table_selector, other
        ))),
    }
}
