use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::awr::ReportDocument;
use crate::core::StoreError;
use crate::dataset::Dataset;
use crate::facts::{Fact, FactQuery};
use crate::storage::{DatasetStore, FactStore, ReportFilter, ReportStore, StorageBackend};

/// Process-local backend. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    reports: RwLock<IndexMap<Uuid, ReportDocument>>,
    datasets: RwLock<IndexMap<Uuid, Dataset>>,
    facts: RwLock<Vec<Fact>>,
}

#[async_trait]
impl StorageBackend for MemoryStore {
    type Config = ();

    async fn new(_config: Self::Config) -> Result<Self, StoreError> {
        Ok(Self::default())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn insert_report(&self, report: &ReportDocument) -> Result<(), StoreError> {
        self.reports.write().await.insert(report.id, report.clone());
        Ok(())
    }

    async fn replace_report(&self, report: &ReportDocument) -> Result<(), StoreError> {
        let mut reports = self.reports.write().await;
        match reports.get_mut(&report.id) {
            Some(slot) => {
                *slot = report.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: "report",
                id: report.id.to_string(),
            }),
        }
    }

    async fn get_report(&self, id: Uuid) -> Result<Option<ReportDocument>, StoreError> {
        Ok(self.reports.read().await.get(&id).cloned())
    }

    async fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<ReportDocument>, StoreError> {
        Ok(self
            .reports
            .read()
            .await
            .values()
            .filter(|r| filter.accepts(&r.id))
            .cloned()
            .collect())
    }

    async fn delete_report(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.reports.write().await.shift_remove(&id).is_some())
    }

    async fn count_reports(&self) -> Result<u64, StoreError> {
        Ok(self.reports.read().await.len() as u64)
    }
}

#[async_trait]
impl DatasetStore for MemoryStore {
    async fn insert_dataset(&self, dataset: &Dataset) -> Result<(), StoreError> {
        self.datasets.write().await.insert(dataset.id, dataset.clone());
        Ok(())
    }

    async fn update_dataset(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let mut datasets = self.datasets.write().await;
        match datasets.get_mut(&dataset.id) {
            Some(slot) => {
                *slot = dataset.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: "dataset",
                id: dataset.id.to_string(),
            }),
        }
    }

    async fn get_dataset(&self, id: Uuid) -> Result<Option<Dataset>, StoreError> {
        Ok(self.datasets.read().await.get(&id).cloned())
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, StoreError> {
        Ok(self.datasets.read().await.values().cloned().collect())
    }

    async fn delete_dataset(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.datasets.write().await.shift_remove(&id).is_some())
    }

    async fn count_datasets(&self) -> Result<u64, StoreError> {
        Ok(self.datasets.read().await.len() as u64)
    }
}

#[async_trait]
impl FactStore for MemoryStore {
    async fn insert_facts(&self, facts: &[Fact]) -> Result<(), StoreError> {
        self.facts.write().await.extend_from_slice(facts);
        Ok(())
    }

    async fn delete_facts(&self, dataset_id: Uuid) -> Result<u64, StoreError> {
        let mut facts = self.facts.write().await;
        let before = facts.len();
        facts.retain(|f| f.dataset_id != dataset_id);
        Ok((before - facts.len()) as u64)
    }

    async fn find_facts(&self, query: &FactQuery) -> Result<Vec<Fact>, StoreError> {
        let mut found: Vec<Fact> = self
            .facts
            .read()
            .await
            .iter()
            .filter(|f| query.matches(f))
            .cloned()
            .collect();
        found.sort_by_key(|f| f.start);
        Ok(found)
    }
}
