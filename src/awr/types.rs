use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One data row: column label -> cleaned cell text, in physical cell order.
pub type Row = IndexMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub title: String,
    pub details: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub summary: Summary,
    pub data: Vec<Row>,
}

impl Table {
    pub fn first_row(&self) -> Option<&Row> {
        self.data.first()
    }
}

/// Canonical structured form of one parsed report.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportDocument {
    pub id: Uuid,
    pub original_file_name: String,
    pub parsed_at: DateTime<Utc>,
    pub blob_id: Option<Uuid>,
    /// Start of the snapshot window, taken from the first "Snap Time" row.
    pub start: Option<NaiveDateTime>,
    pub total_executions: Option<f64>,
    /// Section key -> table. Later tables with the same key replace earlier ones.
    pub tables: IndexMap<String, Table>,
}

impl ReportDocument {
    pub fn new(original_file_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_file_name: original_file_name.into(),
            parsed_at: Utc::now(),
            blob_id: None,
            start: None,
            total_executions: None,
            tables: IndexMap::new(),
        }
    }

    pub fn table(&self, key: &str) -> Option<&Table> {
        self.tables.get(key)
    }

    /// Value of `column` in the first row of section `key`, if both exist.
    pub fn first_value(&self, key: &str, column: &str) -> Option<&str> {
        self.table(key)?.first_row()?.get(column).map(String::as_str)
    }

    /// Value of `column` in row `index` of section `key`.
    pub fn value_at(&self, key: &str, index: usize, column: &str) -> Option<&str> {
        self.table(key)?.data.get(index)?.get(column).map(String::as_str)
    }
}

/// List view of a stored report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: Uuid,
    pub original_file_name: String,
    pub parsed_at: DateTime<Utc>,
    pub db_name: Option<String>,
    pub db_id: Option<String>,
    pub instance: Option<String>,
    pub host_name: Option<String>,
    pub begin_snap_id: Option<String>,
    pub begin_snap_time: Option<String>,
    pub end_snap_id: Option<String>,
    pub end_snap_time: Option<String>,
}

impl From<&ReportDocument> for ReportSummary {
    fn from(doc: &ReportDocument) -> Self {
        let owned = |v: Option<&str>| v.map(String::from);
        Self {
            id: doc.id,
            original_file_name: doc.original_file_name.clone(),
            parsed_at: doc.parsed_at,
            db_name: owned(doc.first_value(sections::DATABASE_INSTANCE, "DB Name")),
            db_id: owned(doc.first_value(sections::DATABASE_INSTANCE, "DB Id")),
            instance: owned(doc.first_value(sections::DATABASE_INSTANCE, "Instance")),
            host_name: owned(doc.first_value(sections::HOST, "Host Name")),
            begin_snap_id: owned(doc.value_at(sections::SNAPSHOT, 0, "Snap Id")),
            begin_snap_time: owned(doc.value_at(sections::SNAPSHOT, 0, "Snap Time")),
            end_snap_id: owned(doc.value_at(sections::SNAPSHOT, 1, "Snap Id")),
            end_snap_time: owned(doc.value_at(sections::SNAPSHOT, 1, "Snap Time")),
        }
    }
}

/// Section keys the rest of the crate addresses directly.
pub mod sections {
    pub const DATABASE_INSTANCE: &str = "database instance information";
    pub const HOST: &str = "host information";
    pub const SNAPSHOT: &str = "snapshot information";
}
