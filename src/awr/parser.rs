use log::{debug, warn};
use std::io::Read;

use super::sanitize::{clean_text, parse_summary, section_key};
use super::tokenizer::{TagEvent, Tokenizer};
use super::types::{ReportDocument, Row, Table};
use crate::core::config::ParserOptions;
use crate::core::ParseError;

/// List item text carrying the report-wide execution count.
pub const TOTAL_EXECUTIONS_MARKER: &str = "Total Executions:";

#[derive(Debug)]
struct OpenTag {
    name: String,
    attributes: Vec<(String, String)>,
}

impl OpenTag {
    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// State of one open `<table>`. `table` is `None` when the element carries no
/// summary: its content is still walked but nothing is recorded.
#[derive(Debug, Default)]
struct TableFrame {
    table: Option<Table>,
    headers: Vec<String>,
}

/// Streaming state machine turning tokenizer events into a `ReportDocument`.
pub struct ReportParser {
    options: ParserOptions,
    document: ReportDocument,
    tags: Vec<OpenTag>,
    tables: Vec<TableFrame>,
    row: Row,
    column: usize,
}

impl ReportParser {
    /// Starts a parse that fills `document`; its identity fields are kept.
    pub fn new(options: ParserOptions, document: ReportDocument) -> Self {
        Self {
            options,
            document,
            tags: Vec::new(),
            tables: Vec::new(),
            row: Row::new(),
            column: 0,
        }
    }

    pub fn feed(&mut self, event: TagEvent) -> Result<(), ParseError> {
        match event {
            TagEvent::Open { name, attributes } => {
                self.open_tag(name, attributes);
                Ok(())
            }
            TagEvent::Text(text) => {
                self.text(&text);
                Ok(())
            }
            TagEvent::Close { name } => self.close_tag(&name),
        }
    }

    /// Ends the stream and hands over the document.
    pub fn finish(self) -> ReportDocument {
        if !self.tags.is_empty() {
            debug!(
                "{}: {} tags left open at end of input",
                self.document.original_file_name,
                self.tags.len()
            );
        }
        self.document
    }

    fn open_tag(&mut self, name: String, attributes: Vec<(String, String)>) {
        let tag = OpenTag { name, attributes };

        match tag.name.as_str() {
            "table" => {
                let table = tag
                    .attribute("summary")
                    .filter(|s| !s.trim().is_empty())
                    .map(|summary| Table {
                        summary: parse_summary(summary),
                        data: Vec::new(),
                    });
                if table.is_none() {
                    debug!("Skipping table without summary");
                }
                self.tables.push(TableFrame {
                    table,
                    headers: Vec::new(),
                });
            }
            "tr" => {
                self.column = 0;
                self.row = Row::new();
            }
            _ => {}
        }

        self.tags.push(tag);
    }

    fn close_tag(&mut self, name: &str) -> Result<(), ParseError> {
        let tag = self.tags.pop().ok_or_else(|| ParseError::EmptyStack {
            found: name.to_string(),
        })?;
        if tag.name != name {
            return Err(ParseError::Structural {
                expected: tag.name,
                found: name.to_string(),
            });
        }

        match name {
            "table" => {
                if let Some(TableFrame {
                    table: Some(table), ..
                }) = self.tables.pop()
                {
                    self.register(table);
                }
            }
            "td" => self.column += 1,
            "th" => {
                self.column += 1;
                if let Some(frame) = self.tables.last_mut() {
                    // Header cells without text still occupy a column.
                    if frame.headers.len() < self.column {
                        frame.headers.push(format!("Column {}", self.column));
                    }
                }
            }
            "tr" => {
                let row = std::mem::take(&mut self.row);
                if row.values().any(|v| !v.is_empty()) {
                    if let Some(table) = self.tables.last_mut().and_then(|f| f.table.as_mut()) {
                        table.data.push(row);
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn text(&mut self, raw: &str) {
        let Some(current) = self.tags.last() else {
            return;
        };

        match current.name.as_str() {
            "th" => {
                let label = clean_text(&raw.trim().replace('.', "_"), &self.options.header_aliases);
                if let Some(frame) = self.tables.last_mut() {
                    frame.headers.push(label);
                }
            }
            "a" => {
                let in_cell = self.tags.len() >= 2 && self.tags[self.tags.len() - 2].name == "td";
                if in_cell {
                    self.cell_text(raw);
                }
            }
            "td" => self.cell_text(raw),
            "li" => self.list_item(raw),
            _ => {}
        }
    }

    fn cell_text(&mut self, raw: &str) {
        let headers = self
            .tables
            .last()
            .map(|f| f.headers.as_slice())
            .unwrap_or_default();
        let label = match headers.get(self.column) {
            Some(header) => header.clone(),
            None => format!("Column {}", self.column),
        };
        let value = clean_text(raw, &self.options.header_aliases);

        // A cell may arrive in several chunks around inline markup.
        self.row
            .entry(label)
            .and_modify(|v| v.push_str(&value))
            .or_insert(value);
    }

    fn list_item(&mut self, raw: &str) {
        let Some(rest) = raw.trim_start().strip_prefix(TOTAL_EXECUTIONS_MARKER) else {
            return;
        };
        let count = rest.split_whitespace().next().unwrap_or("").replace(',', "");
        match count.parse::<f64>() {
            Ok(n) => self.document.total_executions = Some(n),
            Err(_) => warn!("Cannot read total executions from '{}'", raw.trim()),
        }
    }

    fn register(&mut self, table: Table) {
        let key = section_key(&table.summary.title, &self.options.header_aliases);
        debug!("Registering table '{}' with {} rows", key, table.data.len());
        if self.document.tables.insert(key.clone(), table).is_some() {
            debug!("Table '{}' replaced an earlier table with the same key", key);
        }
    }
}

/// Parses a complete report from raw bytes into `document`.
pub fn parse_into<R: Read>(
    input: R,
    options: &ParserOptions,
    document: ReportDocument,
) -> Result<ReportDocument, ParseError> {
    let mut parser = ReportParser::new(options.clone(), document);
    for event in Tokenizer::from_bytes(input, options.encoding) {
        parser.feed(event?)?;
    }
    Ok(parser.finish())
}

/// Parses a complete report from raw bytes into a fresh document.
pub fn parse<R: Read>(
    input: R,
    original_file_name: &str,
    options: &ParserOptions,
) -> Result<ReportDocument, ParseError> {
    parse_into(input, options, ReportDocument::new(original_file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(html: &str) -> Result<ReportDocument, ParseError> {
        parse(html.as_bytes(), "test.html", &ParserOptions::default())
    }

    #[test]
    fn test_headers_and_rows() {
        let doc = parse_str(
            r#"<html><body>
            <table summary="This table displays host information">
              <tr><th class="awrbg">Host Name</th><th>Platform</th><th>CPUs</th></tr>
              <tr><td>db01</td><td>Linux x86 64-bit</td><td>16</td></tr>
            </table>
            </body></html>"#,
        )
        .unwrap();

        let table = doc.table("host information").unwrap();
        assert_eq!(table.summary.title, "Host information");
        assert_eq!(table.data.len(), 1);
        assert_eq!(table.data[0]["Host Name"], "db01");
        assert_eq!(table.data[0]["Platform"], "Linux x86 64-bit");
        assert_eq!(table.data[0]["CPUs"], "16");
        let labels: Vec<_> = table.data[0].keys().cloned().collect();
        assert_eq!(labels, vec!["Host Name", "Platform", "CPUs"]);
    }

    #[test]
    fn test_synthesized_column_labels() {
        let doc = parse_str(
            r#"<table summary="Snapshot information. Begin and end">
              <tr><th></th><th>Snap Id</th><th>Snap Time</th></tr>
              <tr><td>Begin Snap:</td><td>100</td><td>05-Feb-17 10:00:05</td></tr>
            </table>
            <table summary="Instance efficiency percentages">
              <tr><td>Buffer Nowait %:</td><td>99.99</td><td>Redo NoWait %:</td><td>100.00</td></tr>
            </table>"#,
        )
        .unwrap();

        // Empty header cells are 1-based placeholders.
        let snap = doc.table("snapshot information").unwrap();
        assert_eq!(snap.summary.details, "Begin and end");
        assert_eq!(snap.data[0]["Column 1"], "Begin Snap:");
        assert_eq!(snap.data[0]["Snap Id"], "100");

        // Cells without any header are 0-based placeholders.
        let eff = doc.table("instance efficiency percentages").unwrap();
        assert_eq!(eff.data[0]["Column 0"], "Buffer Nowait %:");
        assert_eq!(eff.data[0]["Column 3"], "100.00");
    }

    #[test]
    fn test_cells_beyond_headers() {
        let doc = parse_str(
            r#"<table summary="Cache sizes">
              <tr><th>A</th></tr>
              <tr><td>1</td><td>2</td></tr>
            </table>"#,
        )
        .unwrap();
        let row = &doc.table("cache sizes").unwrap().data[0];
        assert_eq!(row["A"], "1");
        assert_eq!(row["Column 1"], "2");
    }

    #[test]
    fn test_empty_rows_dropped() {
        let doc = parse_str(
            r#"<table summary="Waits">
              <tr><th>Event</th><th>Waits</th></tr>
              <tr><td>db file sequential read</td><td>10</td></tr>
              <tr><td>&#160;</td><td> </td></tr>
              <tr></tr>
              <tr><td>log file sync</td><td>&#160;</td></tr>
            </table>"#,
        )
        .unwrap();
        let table = doc.table("waits").unwrap();
        assert_eq!(table.data.len(), 2);
        assert_eq!(table.data[1]["Waits"], "");
    }

    #[test]
    fn test_text_chunks_are_appended() {
        let doc = parse_str(
            r##"<table summary="Top SQL">
              <tr><th>SQL Id</th><th>SQL Text</th></tr>
              <tr><td><a class="awr" href="#abc">abc123</a></td><td>select 1<b>x</b> from dual</td></tr>
            </table>"##,
        )
        .unwrap();
        let row = &doc.table("top sql").unwrap().data[0];
        assert_eq!(row["SQL Id"], "abc123");
        // Text inside <b> is not a cell-level event; chunks around it append.
        assert_eq!(row["SQL Text"], "select 1from dual");
    }

    #[test]
    fn test_header_periods_and_aliases() {
        let doc = parse_str(
            r#"<table summary="Top Segments by Logical Reads">
              <tr><th>Obj. Type</th><th>D B Time (s)</th></tr>
              <tr><td>TABLE</td><td>1.5</td></tr>
            </table>"#,
        )
        .unwrap();
        let row = &doc.table("top segments by logical reads").unwrap().data[0];
        assert_eq!(row["Obj_ Type"], "TABLE");
        assert_eq!(row["DB Time (s)"], "1.5");
    }

    #[test]
    fn test_table_without_summary_ignored() {
        let doc = parse_str(
            r#"<table border="0"><tr><th>X</th></tr><tr><td>1</td></tr></table>
               <table summary="Kept"><tr><td>2</td></tr></table>"#,
        )
        .unwrap();
        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.table("kept").unwrap().data[0]["Column 0"], "2");
    }

    #[test]
    fn test_nested_untracked_table_does_not_leak() {
        let doc = parse_str(
            r#"<table summary="Outer">
                <tr><td>a</td></tr>
                <tr><td><table><tr><td>inner</td></tr></table></td></tr>
                <tr><td>b</td></tr>
               </table>"#,
        )
        .unwrap();
        let outer = doc.table("outer").unwrap();
        let values: Vec<_> = outer.data.iter().map(|r| r["Column 0"].as_str()).collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn test_same_key_last_wins() {
        let doc = parse_str(
            r#"<table summary="Service Statistics"><tr><td>first</td></tr></table>
               <table summary="Service statistics. Ordered by DB time"><tr><td>second</td></tr></table>"#,
        )
        .unwrap();
        assert_eq!(doc.tables.len(), 1);
        assert_eq!(
            doc.table("service statistics").unwrap().data[0]["Column 0"],
            "second"
        );
    }

    #[test]
    fn test_total_executions() {
        let doc = parse_str(
            "<ul><li>Total Executions:  1,234,567</li><li>Total Parse Calls: 10</li></ul>",
        )
        .unwrap();
        assert_eq!(doc.total_executions, Some(1234567.0));
    }

    #[test]
    fn test_unbalanced_markup_fails() {
        let err = parse_str("<table summary=\"X\"><tr><td>1</tr></table>").unwrap_err();
        match err {
            ParseError::Structural { expected, found } => {
                assert_eq!(expected, "td");
                assert_eq!(found, "tr");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = parse_str("<p>x</p></div>").unwrap_err();
        assert!(matches!(err, ParseError::EmptyStack { .. }));
    }

    #[test]
    fn test_document_without_tables() {
        let doc = parse_str("<html><head><title>AWR</title></head><body></body></html>").unwrap();
        assert!(doc.tables.is_empty());
        assert_eq!(doc.original_file_name, "test.html");
    }
}
