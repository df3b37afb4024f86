use std::str::FromStr;

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::awr::ReportDocument;
use crate::core::StoreError;
use crate::dataset::Dataset;
use crate::facts::{Fact, FactQuery};
use crate::storage::{DatasetStore, FactStore, ReportFilter, ReportStore, StorageBackend};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS reports (id TEXT PRIMARY KEY, body TEXT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS datasets (id TEXT PRIMARY KEY, body TEXT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS facts (
        dataset_id TEXT NOT NULL,
        start TEXT NOT NULL,
        category TEXT NOT NULL,
        name TEXT NOT NULL,
        body TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS facts_by_category ON facts (dataset_id, category)",
];

/// Sortable text form of a fact start.
const START_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Clone)]
pub struct SqliteConfig {
    pub url: String,
    pub max_connections: u32,
}

impl SqliteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 4,
        }
    }

    /// Private in-memory database. A single pooled connection keeps it alive.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }
}

/// Backend storing each record as a JSON body next to its lookup columns.
pub struct SqliteStore {
    pool: SqlitePool,
}

fn decode<T: DeserializeOwned>(row: &SqliteRow) -> Result<T, StoreError> {
    let body: String = row.try_get("body")?;
    Ok(serde_json::from_str(&body)?)
}

impl SqliteStore {
    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn count(&self, table: &str) -> Result<u64, StoreError> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count as u64)
    }

    async fn delete_by_id(&self, table: &str, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_body(&self, table: &str, kind: &'static str, id: Uuid, body: String) -> Result<(), StoreError> {
        let result = sqlx::query(&format!("UPDATE {} SET body = ? WHERE id = ?", table))
            .bind(body)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_body<T: DeserializeOwned>(&self, table: &str, id: Uuid) -> Result<Option<T>, StoreError> {
        let row = sqlx::query(&format!("SELECT body FROM {} WHERE id = ?", table))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode).transpose()
    }
}

#[async_trait]
impl StorageBackend for SqliteStore {
    type Config = SqliteConfig;

    async fn new(config: Self::Config) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        debug!("Opened sqlite store at {}", config.url);
        Ok(store)
    }
}

#[async_trait]
impl ReportStore for SqliteStore {
    async fn insert_report(&self, report: &ReportDocument) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO reports (id, body) VALUES (?, ?)")
            .bind(report.id.to_string())
            .bind(serde_json::to_string(report)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_report(&self, report: &ReportDocument) -> Result<(), StoreError> {
        self.update_body("reports", "report", report.id, serde_json::to_string(report)?)
            .await
    }

    async fn get_report(&self, id: Uuid) -> Result<Option<ReportDocument>, StoreError> {
        self.get_body("reports", id).await
    }

    async fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<ReportDocument>, StoreError> {
        let rows = sqlx::query("SELECT id, body FROM reports ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let mut reports = Vec::new();
        for row in &rows {
            let id: String = row.try_get("id")?;
            let accepted = Uuid::parse_str(&id).map_or(false, |id| filter.accepts(&id));
            if accepted {
                reports.push(decode(row)?);
            }
        }
        Ok(reports)
    }

    async fn delete_report(&self, id: Uuid) -> Result<bool, StoreError> {
        self.delete_by_id("reports", id).await
    }

    async fn count_reports(&self) -> Result<u64, StoreError> {
        self.count("reports").await
    }
}

#[async_trait]
impl DatasetStore for SqliteStore {
    async fn insert_dataset(&self, dataset: &Dataset) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO datasets (id, body) VALUES (?, ?)")
            .bind(dataset.id.to_string())
            .bind(serde_json::to_string(dataset)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_dataset(&self, dataset: &Dataset) -> Result<(), StoreError> {
        self.update_body("datasets", "dataset", dataset.id, serde_json::to_string(dataset)?)
            .await
    }

    async fn get_dataset(&self, id: Uuid) -> Result<Option<Dataset>, StoreError> {
        self.get_body("datasets", id).await
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, StoreError> {
        let rows = sqlx::query("SELECT body FROM datasets ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode).collect()
    }

    async fn delete_dataset(&self, id: Uuid) -> Result<bool, StoreError> {
        self.delete_by_id("datasets", id).await
    }

    async fn count_datasets(&self) -> Result<u64, StoreError> {
        self.count("datasets").await
    }
}

#[async_trait]
impl FactStore for SqliteStore {
    async fn insert_facts(&self, facts: &[Fact]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for fact in facts {
            sqlx::query("INSERT INTO facts (dataset_id, start, category, name, body) VALUES (?, ?, ?, ?, ?)")
                .bind(fact.dataset_id.to_string())
                .bind(fact.start.format(START_FORMAT).to_string())
                .bind(fact.category.as_str())
                .bind(fact.name.as_str())
                .bind(serde_json::to_string(fact)?)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_facts(&self, dataset_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM facts WHERE dataset_id = ?")
            .bind(dataset_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_facts(&self, query: &FactQuery) -> Result<Vec<Fact>, StoreError> {
        let mut conditions = vec!["dataset_id = ?".to_string()];
        let mut params = vec![query.dataset_id.to_string()];

        if let Some(category) = &query.category {
            conditions.push("category = ?".to_string());
            params.push(category.clone());
        } else if !query.names.is_empty() {
            let placeholders = vec!["?"; query.names.len()].join(", ");
            conditions.push(format!("name IN ({})", placeholders));
            params.extend(query.names.iter().cloned());
        }

        let sql = format!(
            "SELECT body FROM facts WHERE {} ORDER BY start, rowid",
            conditions.join(" AND ")
        );
        let mut statement = sqlx::query(&sql);
        for param in params {
            statement = statement.bind(param);
        }
        let rows = statement.fetch_all(&self.pool).await?;

        let mut facts = Vec::with_capacity(rows.len());
        for row in &rows {
            let fact: Fact = decode(row)?;
            if query.matches(&fact) {
                facts.push(fact);
            }
        }
        Ok(facts)
    }
}
