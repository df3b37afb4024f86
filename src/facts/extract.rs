use chrono::NaiveDateTime;
use log::{debug, warn};
use uuid::Uuid;

use super::lookup::{first_row_value, lookup, section};
use super::numeric::{parse_mib, parse_snap_time, round_significant, to_number};
use super::rules::{
    Impact, RowName, RowRule, Scope, SqlRule, ValueKind, BEGIN_SNAP, END_SNAP, FIRST_ROW_RULES,
    LOOKUP_RULES, ROW_RULES, SNAPSHOT_MATCH_COLUMN, SNAP_TIME, SQL_IMPACT, SQL_MODULE, SQL_RULES,
};
use super::types::{Dimension, Fact, FactValue, DB_NAME, HOST_NAME, INSTANCE, SQL_ID};
use crate::awr::types::sections;
use crate::awr::{ReportDocument, Row};
use crate::core::config::ExtractorOptions;
use crate::core::ExtractError;

/// Derives the dimensioned facts of one report for one dataset.
#[derive(Clone, Debug, Default)]
pub struct FactExtractor {
    options: ExtractorOptions,
}

/// Collects facts sharing a dataset and snapshot window.
struct Emitter {
    dataset_id: Uuid,
    start: NaiveDateTime,
    end: NaiveDateTime,
    facts: Vec<Fact>,
}

impl Emitter {
    fn push(&mut self, dimensions: &[Dimension], category: &str, name: impl Into<String>, value: FactValue) {
        self.facts.push(Fact {
            dataset_id: self.dataset_id,
            start: self.start,
            end: self.end,
            dimensions: dimensions.to_vec(),
            category: category.to_string(),
            name: name.into(),
            value,
        });
    }
}

fn convert(raw: &str, kind: ValueKind) -> Result<FactValue, ExtractError> {
    Ok(match kind {
        ValueKind::Number => FactValue::Number(to_number(raw)?),
        ValueKind::Mebibytes => FactValue::Number(parse_mib(raw)?),
        ValueKind::Text => FactValue::Text(raw.to_string()),
    })
}

/// Optional cell; absent reads as empty.
fn cell<'a>(row: &'a Row, column: &str) -> &'a str {
    row.get(column).map(String::as_str).unwrap_or("")
}

/// Cell a rule depends on. An absent column fails the whole report.
fn column<'a>(row: &'a Row, section: &str, column: &str) -> Result<&'a str, ExtractError> {
    row.get(column)
        .map(String::as_str)
        .ok_or_else(|| ExtractError::MissingColumn {
            section: section.to_string(),
            column: column.to_string(),
        })
}

fn segment_name(row: &Row, section: &str) -> Result<String, ExtractError> {
    let mut name = format!(
        "{} {}.{}",
        column(row, section, "Obj_ Type")?,
        column(row, section, "Owner")?,
        column(row, section, "Object Name")?
    );
    let sub = cell(row, "Subobject Name");
    if !sub.is_empty() {
        name.push('.');
        name.push_str(sub);
    }
    Ok(name)
}

impl FactExtractor {
    pub fn new(options: ExtractorOptions) -> Self {
        Self { options }
    }

    fn snap_time(&self, doc: &ReportDocument, label: &str) -> Result<NaiveDateTime, ExtractError> {
        let raw = lookup(
            doc,
            sections::SNAPSHOT,
            SNAPSHOT_MATCH_COLUMN,
            label,
            SNAP_TIME,
            &self.options.metric_aliases,
        )?;
        parse_snap_time(raw, &self.options.snap_time_formats).ok_or_else(|| ExtractError::InvalidTime {
            value: raw.to_string(),
        })
    }

    /// All facts for `doc`. Mandatory sections must be present; per-row
    /// sections that are missing contribute nothing.
    pub fn extract(&self, doc: &ReportDocument, dataset_id: Uuid) -> Result<Vec<Fact>, ExtractError> {
        let start = self.snap_time(doc, BEGIN_SNAP)?;
        let end = self.snap_time(doc, END_SNAP)?;
        if end < start {
            return Err(ExtractError::InvalidTime {
                value: format!("end snapshot {} precedes begin snapshot {}", end, start),
            });
        }

        let host = [Dimension::new(
            HOST_NAME,
            first_row_value(doc, sections::HOST, HOST_NAME)?,
        )];
        let instance = [
            Dimension::new(DB_NAME, first_row_value(doc, sections::DATABASE_INSTANCE, DB_NAME)?),
            Dimension::new(INSTANCE, first_row_value(doc, sections::DATABASE_INSTANCE, INSTANCE)?),
        ];

        let mut out = Emitter {
            dataset_id,
            start,
            end,
            facts: Vec::new(),
        };

        for rule in FIRST_ROW_RULES {
            let raw = first_row_value(doc, rule.section, rule.column)?;
            let dims: &[Dimension] = match rule.scope {
                Scope::Host => &host,
                Scope::Instance => &instance,
            };
            out.push(dims, rule.category, rule.name, convert(raw, rule.kind)?);
        }

        for rule in LOOKUP_RULES {
            let raw = lookup(
                doc,
                rule.section,
                rule.match_column,
                rule.label,
                rule.value_column,
                &self.options.metric_aliases,
            )?;
            out.push(&instance, rule.category, rule.name, convert(raw, rule.kind)?);
        }

        for rule in ROW_RULES {
            self.extract_rows(doc, rule, &instance, &mut out)?;
        }

        for rule in SQL_RULES {
            self.extract_sql(doc, rule, &instance, &mut out)?;
        }

        debug!(
            "Extracted {} facts from report {} ({})",
            out.facts.len(),
            doc.id,
            doc.original_file_name
        );
        Ok(out.facts)
    }

    fn extract_rows(
        &self,
        doc: &ReportDocument,
        rule: &RowRule,
        dims: &[Dimension],
        out: &mut Emitter,
    ) -> Result<(), ExtractError> {
        let Ok(table) = section(doc, rule.section) else {
            return Ok(());
        };

        for row in &table.data {
            if let Some(column) = rule.skip_blank {
                if row.get(column).is_some_and(|v| v.is_empty()) {
                    continue;
                }
            }
            let name = match rule.name {
                RowName::Column(name) => column(row, rule.section, name)?.to_string(),
                RowName::Segment => segment_name(row, rule.section)?,
            };
            let raw = column(row, rule.section, rule.value_column)?;
            out.push(dims, rule.category, name, convert(raw, rule.kind)?);
        }
        Ok(())
    }

    fn extract_sql(
        &self,
        doc: &ReportDocument,
        rule: &SqlRule,
        dims: &[Dimension],
        out: &mut Emitter,
    ) -> Result<(), ExtractError> {
        let Ok(table) = section(doc, rule.section) else {
            return Ok(());
        };

        for row in &table.data {
            let sql_id = column(row, rule.section, SQL_ID)?;
            let value = to_number(column(row, rule.section, rule.value_column)?)?;
            out.push(
                dims,
                rule.category,
                format!("{} {}", sql_id, cell(row, "SQL Text")),
                FactValue::Number(value),
            );

            let impact = match rule.impact {
                Impact::Column(name) => Some(to_number(column(row, rule.section, name)?)?),
                Impact::ShareOfExecutions => match doc.total_executions {
                    Some(total) if total > 0.0 => Some(round_significant(value * 100.0 / total, 2)),
                    _ => {
                        warn!(
                            "Report {} has no total execution count, skipping impact of {}",
                            doc.id, sql_id
                        );
                        None
                    }
                },
                Impact::None => None,
            };
            if let Some(impact) = impact {
                let mut impact_dims = dims.to_vec();
                impact_dims.push(Dimension::new(SQL_ID, sql_id));
                out.push(&impact_dims, SQL_IMPACT, rule.category, FactValue::Number(impact));
            }

            if let Some(module) = row.get(SQL_MODULE) {
                out.push(dims, SQL_MODULE, sql_id, FactValue::Text(module.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::awr::{Summary, Table};

    fn table(rows: &[&[(&str, &str)]]) -> Table {
        Table {
            summary: Summary::default(),
            data: rows
                .iter()
                .map(|cells| cells.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
                .collect(),
        }
    }

    fn minimal_report() -> ReportDocument {
        let mut doc = ReportDocument::new("minimal.html");
        let mut add = |key: &str, t: Table| {
            doc.tables.insert(key.to_string(), t);
        };
        add(
            "database instance information",
            table(&[&[("DB Name", "FOO"), ("DB Id", "1"), ("Instance", "FOO1")]]),
        );
        add(
            "host information",
            table(&[&[
                ("Host Name", "db01"),
                ("Platform", "Linux x86 64-bit"),
                ("CPUs", "16"),
                ("Cores", "8"),
                ("Sockets", "2"),
                ("Memory (GB)", "125.8"),
            ]]),
        );
        add(
            "snapshot information",
            table(&[
                &[
                    ("Column 1", "Begin Snap:"),
                    ("Snap Id", "100"),
                    ("Snap Time", "05-Feb-17 10:00:05"),
                    ("Sessions", "120"),
                    ("Cursors/Session", "2.5"),
                ],
                &[
                    ("Column 1", "End Snap:"),
                    ("Snap Id", "101"),
                    ("Snap Time", "05-Feb-17 11:00:02"),
                    ("Sessions", "130"),
                    ("Cursors/Session", "2.7"),
                ],
            ]),
        );
        add("system load statistics", table(&[&[("%User", "12.5"), ("%System", "3.1")]]));
        add(
            "cache sizes and other statistics for different types of cache",
            table(&[
                &[
                    ("Column 1", "Buffer Cache:"),
                    ("Begin", "2G"),
                    ("Column 4", "Std Block Size:"),
                    ("Column 5", "8K"),
                ],
                &[
                    ("Column 1", "Shared Pool Size:"),
                    ("Begin", "1,024M"),
                    ("Column 4", "Log Buffer:"),
                    ("Column 5", "500K"),
                ],
            ]),
        );
        let load: Vec<(&str, &str)> = vec![
            ("DB Time(s):", "1.5"),
            ("DB CPU(s):", "0.9"),
            ("Redo size (bytes):", "2,048.0"),
            ("Logical read (blocks):", "100"),
            ("Block changes:", "10"),
            ("Physical read (blocks):", "5"),
            ("Physical write (blocks):", "2"),
            ("User calls:", "50"),
            ("Parses (SQL):", "20"),
            ("Hard parses (SQL):", "1"),
            ("Logons:", "0.2"),
            ("Executes (SQL):", "80"),
            ("Rollbacks:", "0"),
            ("Transactions:", "3"),
        ];
        let load_rows: Vec<Vec<(&str, &str)>> = load
            .iter()
            .map(|(label, v)| vec![("Column 1", *label), ("Per Second", *v)])
            .collect();
        let load_refs: Vec<&[(&str, &str)]> = load_rows.iter().map(|r| r.as_slice()).collect();
        add("load profile", table(&load_refs));
        add(
            "instance efficiency percentages",
            table(&[
                &[
                    ("Column 0", "Buffer Nowait %:"),
                    ("Column 1", "100.00"),
                    ("Column 2", "Redo NoWait %:"),
                    ("Column 3", "99.99"),
                ],
                &[
                    ("Column 0", "Buffer Hit %:"),
                    ("Column 1", "99.5"),
                    ("Column 2", "In-memory Sort %:"),
                    ("Column 3", "100.00"),
                ],
                &[
                    ("Column 0", "Library Hit %:"),
                    ("Column 1", "98.1"),
                    ("Column 2", "Soft Parse %:"),
                    ("Column 3", "95.0"),
                ],
                &[
                    ("Column 0", "Execute to Parse %:"),
                    ("Column 1", "75.0"),
                    ("Column 2", "Latch Hit %:"),
                    ("Column 3", "99.9"),
                ],
                &[
                    ("Column 0", "Parse CPU to Parse Elapsd %:"),
                    ("Column 1", "80.0"),
                    ("Column 2", "% Non-Parse CPU:"),
                    ("Column 3", "97.0"),
                ],
            ]),
        );
        doc
    }

    fn find<'a>(facts: &'a [Fact], category: &str, name: &str) -> &'a Fact {
        facts
            .iter()
            .find(|f| f.category == category && f.name == name)
            .unwrap_or_else(|| panic!("no fact {}/{}", category, name))
    }

    #[test]
    fn test_mandatory_facts() {
        let doc = minimal_report();
        let ds = Uuid::new_v4();
        let facts = FactExtractor::default().extract(&doc, ds).unwrap();

        let user = find(&facts, "Host CPU", "CPU %User");
        assert_eq!(user.value, FactValue::Number(12.5));
        assert_eq!(user.dimension(HOST_NAME), Some("db01"));
        assert_eq!(user.dataset_id, ds);
        assert_eq!(user.start.to_string(), "2017-02-05 10:00:05");
        assert_eq!(user.end.to_string(), "2017-02-05 11:00:02");

        let sessions = find(&facts, "Sessions", "Sessions");
        assert_eq!(sessions.value, FactValue::Number(120.0));
        assert_eq!(sessions.dimension(DB_NAME), Some("FOO"));
        assert_eq!(sessions.dimension(INSTANCE), Some("FOO1"));

        assert_eq!(
            find(&facts, "Host information", "Platform").value,
            FactValue::Text("Linux x86 64-bit".into())
        );
        assert_eq!(find(&facts, "Cache Sizes", "Buffer Cache").value, FactValue::Number(2000.0));
        assert_eq!(find(&facts, "Cache Sizes", "Log Buffer").value, FactValue::Number(0.49));
        assert_eq!(
            find(&facts, "Load Profile - Redo Size", "Redo Size per second").value,
            FactValue::Number(2048.0)
        );
        assert_eq!(
            find(&facts, "Load Profile - Activities", "Hard parses per second").value,
            FactValue::Number(1.0)
        );
        assert_eq!(
            find(&facts, "Instance Efficiency", "Non-Parse CPU").value,
            FactValue::Number(97.0)
        );
        assert!(facts.iter().all(|f| f.start == facts[0].start && f.end == facts[0].end));
    }

    #[test]
    fn test_missing_mandatory_section() {
        let mut doc = minimal_report();
        doc.tables.shift_remove("load profile");
        assert!(matches!(
            FactExtractor::default().extract(&doc, Uuid::new_v4()),
            Err(ExtractError::MissingSection { .. })
        ));
    }

    #[test]
    fn test_unparseable_snap_time() {
        let mut doc = minimal_report();
        if let Some(t) = doc.tables.get_mut("snapshot information") {
            t.data[0].insert("Snap Time".into(), "sometime".into());
        }
        assert!(matches!(
            FactExtractor::default().extract(&doc, Uuid::new_v4()),
            Err(ExtractError::InvalidTime { .. })
        ));
    }

    #[test]
    fn test_row_sections() {
        let mut doc = minimal_report();
        doc.tables.insert(
            "foreground wait events and their wait statistics".into(),
            table(&[
                &[("Event", "db file sequential read"), ("Total Wait Time (s)", "1,200"), ("% DB time", "40.1")],
                &[("Event", "SQL*Net message from client"), ("Total Wait Time (s)", "9,000"), ("% DB time", "")],
            ]),
        );
        doc.tables.insert(
            "top segments by logical reads".into(),
            table(&[
                &[
                    ("Owner", "SCOTT"),
                    ("Tablespace Name", "USERS"),
                    ("Object Name", "EMP"),
                    ("Subobject Name", ""),
                    ("Obj_ Type", "TABLE"),
                    ("Logical Reads", "5,000"),
                ],
                &[
                    ("Owner", "SCOTT"),
                    ("Object Name", "SALES"),
                    ("Subobject Name", "P2017"),
                    ("Obj_ Type", "TABLE PARTITION"),
                    ("Logical Reads", "700"),
                ],
            ]),
        );
        let facts = FactExtractor::default().extract(&doc, Uuid::new_v4()).unwrap();

        let waits: Vec<_> = facts.iter().filter(|f| f.category == "Foreground Wait Event").collect();
        assert_eq!(waits.len(), 1);
        assert_eq!(waits[0].name, "db file sequential read");
        assert_eq!(waits[0].value, FactValue::Number(1200.0));
        assert_eq!(waits[0].dimension(DB_NAME), Some("FOO"));

        find(&facts, "Segments by Logical Reads", "TABLE SCOTT.EMP");
        find(&facts, "Segments by Logical Reads", "TABLE PARTITION SCOTT.SALES.P2017");
    }

    #[test]
    fn test_sql_sections() {
        let mut doc = minimal_report();
        doc.total_executions = Some(1000.0);
        doc.tables.insert(
            "top sql by elapsed time".into(),
            table(&[&[
                ("Elapsed Time (s)", "12.3"),
                ("Executions", "4"),
                ("%Total", "25.5"),
                ("SQL Id", "abc123"),
                ("SQL Module", "SQL*Plus"),
                ("SQL Text", "select 1 from dual"),
            ]]),
        );
        doc.tables.insert(
            "top sql by number of executions".into(),
            table(&[&[
                ("Executions", "333"),
                ("SQL Id", "def456"),
                ("SQL Module", "JDBC"),
                ("SQL Text", "update t"),
            ]]),
        );
        doc.tables.insert(
            "the text of the sql statements which have been referred to in the report".into(),
            table(&[&[("SQL Id", "abc123"), ("SQL Text", "select 1 from dual")]]),
        );
        let facts = FactExtractor::default().extract(&doc, Uuid::new_v4()).unwrap();

        assert_eq!(
            find(&facts, "SQL by Elapsed Time", "abc123 select 1 from dual").value,
            FactValue::Number(12.3)
        );
        let impact = find(&facts, SQL_IMPACT, "SQL by Elapsed Time");
        assert_eq!(impact.value, FactValue::Number(25.5));
        assert_eq!(impact.dimension(SQL_ID), Some("abc123"));

        let share = find(&facts, SQL_IMPACT, "SQL by Number of Executions");
        assert_eq!(share.value, FactValue::Number(33.0));

        assert_eq!(find(&facts, SQL_MODULE, "def456").value, FactValue::Text("JDBC".into()));
        assert_eq!(
            find(&facts, "SQL Text", "abc123").value,
            FactValue::Text("select 1 from dual".into())
        );
    }

    #[test]
    fn test_missing_value_column_fails_report() {
        let mut doc = minimal_report();
        doc.tables.insert(
            "top sql by elapsed time".into(),
            table(&[&[
                ("Elapsed (s)", "12.3"),
                ("%Total", "25.5"),
                ("SQL Id", "abc123"),
                ("SQL Text", "select 1 from dual"),
            ]]),
        );
        match FactExtractor::default().extract(&doc, Uuid::new_v4()) {
            Err(ExtractError::MissingColumn { section, column }) => {
                assert_eq!(section, "top sql by elapsed time");
                assert_eq!(column, "Elapsed Time (s)");
            }
            other => panic!("expected missing column, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_impact_and_name_columns_fail_report() {
        let mut doc = minimal_report();
        doc.tables.insert(
            "top sql by cpu time".into(),
            table(&[&[("CPU Time (s)", "4.0"), ("SQL Id", "abc123"), ("SQL Text", "select 1")]]),
        );
        assert!(matches!(
            FactExtractor::default().extract(&doc, Uuid::new_v4()),
            Err(ExtractError::MissingColumn { column, .. }) if column == "%Total"
        ));

        let mut doc = minimal_report();
        doc.tables.insert(
            "foreground wait class statistics".into(),
            table(&[&[("Class", "User I/O"), ("Total Wait Time (s)", "30")]]),
        );
        assert!(matches!(
            FactExtractor::default().extract(&doc, Uuid::new_v4()),
            Err(ExtractError::MissingColumn { column, .. }) if column == "Wait Class"
        ));
    }

    #[test]
    fn test_end_before_start() {
        let mut doc = minimal_report();
        if let Some(t) = doc.tables.get_mut("snapshot information") {
            t.data[1].insert("Snap Time".into(), "05-Feb-17 09:00:00".into());
        }
        assert!(matches!(
            FactExtractor::default().extract(&doc, Uuid::new_v4()),
            Err(ExtractError::InvalidTime { .. })
        ));
    }

    #[test]
    fn test_share_of_executions_without_total() {
        let mut doc = minimal_report();
        doc.tables.insert(
            "top sql by number of executions".into(),
            table(&[&[("Executions", "333"), ("SQL Id", "def456"), ("SQL Text", "update t")]]),
        );
        let facts = FactExtractor::default().extract(&doc, Uuid::new_v4()).unwrap();
        assert!(facts.iter().all(|f| f.category != SQL_IMPACT));
        find(&facts, "SQL by Number of Executions", "def456 update t");
    }
}
