use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::awr::ReportSummary;
use crate::core::service::{run_bulk, BulkOutcome, Stores};
use crate::core::types::Result;
use crate::core::{SpaError, StoreError};
use crate::facts::FactExtractor;
use crate::storage::ReportFilter;

/// A named group of reports whose facts are queried together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Assigned report ids, without duplicates, in assignment order.
    pub report_ids: Vec<Uuid>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            created_at: Utc::now(),
            report_ids: Vec::new(),
        }
    }

    pub fn contains(&self, report_id: &Uuid) -> bool {
        self.report_ids.contains(report_id)
    }
}

fn not_found(id: Uuid) -> SpaError {
    StoreError::NotFound {
        kind: "dataset",
        id: id.to_string(),
    }
    .into()
}

#[derive(Clone)]
pub struct DatasetService {
    stores: Stores,
    extractor: Arc<FactExtractor>,
    parallelism: usize,
}

impl DatasetService {
    pub fn new(stores: Stores, extractor: FactExtractor, parallelism: usize) -> Self {
        Self {
            stores,
            extractor: Arc::new(extractor),
            parallelism,
        }
    }

    pub async fn create(&self, name: &str, description: &str) -> Result<Dataset> {
        let dataset = Dataset::new(name, description);
        self.stores.datasets.insert_dataset(&dataset).await?;
        info!("Created dataset {} ({})", dataset.name, dataset.id);
        Ok(dataset)
    }

    /// Renames or re-describes a dataset. Membership and facts are untouched.
    pub async fn update(&self, id: Uuid, name: &str, description: &str) -> Result<Dataset> {
        let mut dataset = self.require(id).await?;
        dataset.name = name.to_string();
        dataset.description = description.to_string();
        self.stores.datasets.update_dataset(&dataset).await?;
        Ok(dataset)
    }

    pub async fn list(&self) -> Result<Vec<Dataset>> {
        Ok(self.stores.datasets.list_datasets().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Dataset>> {
        Ok(self.stores.datasets.get_dataset(id).await?)
    }

    async fn require(&self, id: Uuid) -> Result<Dataset> {
        self.get(id).await?.ok_or_else(|| not_found(id))
    }

    /// Deletes the dataset together with its facts. Reports stay.
    pub async fn remove(&self, id: Uuid) -> Result<bool> {
        let dropped = self.stores.facts.delete_facts(id).await?;
        let removed = self.stores.datasets.delete_dataset(id).await?;
        if removed {
            info!("Removed dataset {} and {} facts", id, dropped);
        }
        Ok(removed)
    }

    async fn reports(&self, id: Uuid, assigned: bool) -> Result<Vec<ReportSummary>> {
        let dataset = self.require(id).await?;
        let filter = if assigned {
            ReportFilter::Only(dataset.report_ids)
        } else {
            ReportFilter::Except(dataset.report_ids)
        };
        let reports = self.stores.reports.list_reports(&filter).await?;
        Ok(reports.iter().map(ReportSummary::from).collect())
    }

    pub async fn list_reports(&self, id: Uuid) -> Result<Vec<ReportSummary>> {
        self.reports(id, true).await
    }

    pub async fn list_unassigned_reports(&self, id: Uuid) -> Result<Vec<ReportSummary>> {
        self.reports(id, false).await
    }

    /// Adds reports to the dataset and regenerates its facts when membership
    /// changed. Unknown report ids are rejected before anything is written.
    pub async fn assign(&self, id: Uuid, report_ids: &[Uuid]) -> Result<BulkOutcome> {
        let mut dataset = self.require(id).await?;
        for report_id in report_ids {
            if self.stores.reports.get_report(*report_id).await?.is_none() {
                return Err(StoreError::NotFound {
                    kind: "report",
                    id: report_id.to_string(),
                }
                .into());
            }
        }

        let before = dataset.report_ids.len();
        for report_id in report_ids {
            if !dataset.contains(report_id) {
                dataset.report_ids.push(*report_id);
            }
        }
        if dataset.report_ids.len() == before {
            debug!("Dataset {} already holds every given report", id);
            return Ok(BulkOutcome::default());
        }

        self.stores.datasets.update_dataset(&dataset).await?;
        self.recalculate(id).await
    }

    /// Removes reports from the dataset and regenerates its facts when
    /// membership changed.
    pub async fn unassign(&self, id: Uuid, report_ids: &[Uuid]) -> Result<BulkOutcome> {
        let mut dataset = self.require(id).await?;
        let before = dataset.report_ids.len();
        dataset.report_ids.retain(|r| !report_ids.contains(r));
        if dataset.report_ids.len() == before {
            return Ok(BulkOutcome::default());
        }

        self.stores.datasets.update_dataset(&dataset).await?;
        self.recalculate(id).await
    }

    /// Deletes every fact of the dataset, then extracts each assigned report
    /// concurrently. Facts of reports that extracted cleanly are kept even
    /// when others fail.
    pub async fn recalculate(&self, id: Uuid) -> Result<BulkOutcome> {
        let dataset = self.require(id).await?;
        let dropped = self.stores.facts.delete_facts(id).await?;
        debug!("Dropped {} facts of dataset {}", dropped, id);

        let outcome = run_bulk(dataset.report_ids, self.parallelism, |report_id| {
            let service = self.clone();
            async move { service.extract_report(id, report_id).await }
        })
        .await;

        info!(
            "Recalculated dataset {}: {} reports ok, {} failed",
            id,
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }

    async fn extract_report(&self, dataset_id: Uuid, report_id: Uuid) -> Result<()> {
        let report = self
            .stores
            .reports
            .get_report(report_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind: "report",
                id: report_id.to_string(),
            })?;
        let facts = self.extractor.extract(&report, dataset_id)?;
        self.stores.facts.insert_facts(&facts).await?;
        Ok(())
    }

    /// Datasets that have `report_id` assigned.
    pub async fn find_by_report(&self, report_id: Uuid) -> Result<Vec<Dataset>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|d| d.contains(&report_id))
            .collect())
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(self.stores.datasets.count_datasets().await?)
    }
}
