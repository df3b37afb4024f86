use crate::awr::{AliasTable, ReportDocument, Row, Table};
use crate::core::ExtractError;

pub fn section<'a>(doc: &'a ReportDocument, key: &str) -> Result<&'a Table, ExtractError> {
    doc.table(key).ok_or_else(|| ExtractError::MissingSection {
        section: key.to_string(),
    })
}

/// Value of `column` in the first row of section `key`.
pub fn first_row_value<'a>(
    doc: &'a ReportDocument,
    key: &str,
    column: &str,
) -> Result<&'a str, ExtractError> {
    let table = section(doc, key)?;
    table
        .first_row()
        .and_then(|row| row.get(column))
        .map(String::as_str)
        .ok_or_else(|| ExtractError::MissingColumn {
            section: key.to_string(),
            column: column.to_string(),
        })
}

/// Row column holding the match label: `column` itself when present and
/// non-empty, otherwise the first key that resolves to it through `aliases`.
fn match_key<'r>(row: &'r Row, column: &'r str, aliases: &AliasTable) -> &'r str {
    if row.get(column).is_some_and(|v| !v.is_empty()) {
        return column;
    }
    row.keys()
        .find(|k| aliases.canonical(k) == column)
        .map(String::as_str)
        .unwrap_or(column)
}

/// Finds the first row whose `column` cell resolves to the same canonical
/// label as `label`, and returns its `value_column` cell.
pub fn find_row_value<'a>(
    table: &'a Table,
    key: &str,
    column: &str,
    label: &str,
    value_column: &str,
    aliases: &AliasTable,
) -> Result<&'a str, ExtractError> {
    let target = aliases.canonical(label);

    for row in &table.data {
        let key_column = match_key(row, column, aliases);
        let Some(cell) = row.get(key_column).filter(|v| !v.is_empty()) else {
            continue;
        };
        if aliases.canonical(cell) != target {
            continue;
        }
        return row
            .get(value_column)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ExtractError::MissingColumn {
                section: key.to_string(),
                column: value_column.to_string(),
            });
    }

    Err(ExtractError::MissingRow {
        section: key.to_string(),
        column: column.to_string(),
        label: label.to_string(),
    })
}

/// `find_row_value` on section `key` of `doc`.
pub fn lookup<'a>(
    doc: &'a ReportDocument,
    key: &str,
    column: &str,
    label: &str,
    value_column: &str,
    aliases: &AliasTable,
) -> Result<&'a str, ExtractError> {
    find_row_value(section(doc, key)?, key, column, label, value_column, aliases)
}
