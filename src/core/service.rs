use futures::stream::{self, StreamExt};
use log::{error, info};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use super::config::SpaConfig;
use super::types::SpaError;
use crate::dataset::DatasetService;
use crate::facts::{FactExtractor, FactService};
use crate::report::ReportService;
use crate::storage::{
    BlobStore, DatasetStore, FactStore, FsBlobStore, MemoryBlobStore, MemoryStore, ReportStore,
    SqliteConfig, SqliteStore, StorageBackend,
};

/// Handles to every store, shared by the services.
#[derive(Clone)]
pub struct Stores {
    pub reports: Arc<dyn ReportStore>,
    pub datasets: Arc<dyn DatasetStore>,
    pub facts: Arc<dyn FactStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Stores {
    pub fn new<B: StorageBackend + 'static>(backend: Arc<B>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            reports: backend.clone(),
            datasets: backend.clone(),
            facts: backend,
            blobs,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()), Arc::new(MemoryBlobStore::default()))
    }
}

/// Per-item result of a bulk operation. The operation as a whole failed when
/// `failed` is non-empty; work done for `succeeded` items is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkOutcome {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<(Uuid, String)>,
}

impl BulkOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn merge(&mut self, other: BulkOutcome) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }
}

/// Runs `task` once per id on the runtime, at most `parallelism` at a time,
/// and waits for all of them.
pub(crate) async fn run_bulk<F, Fut>(ids: Vec<Uuid>, parallelism: usize, mut task: F) -> BulkOutcome
where
    F: FnMut(Uuid) -> Fut,
    Fut: Future<Output = Result<(), SpaError>> + Send + 'static,
{
    let results: Vec<(Uuid, Result<(), SpaError>)> = stream::iter(ids)
        .map(|id| {
            let handle = tokio::spawn(task(id));
            async move {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(SpaError::from(e)),
                };
                (id, result)
            }
        })
        .buffer_unordered(parallelism.max(1))
        .collect()
        .await;

    let mut outcome = BulkOutcome::default();
    for (id, result) in results {
        match result {
            Ok(()) => outcome.succeeded.push(id),
            Err(e) => {
                error!("Bulk task for {} failed: {}", id, e);
                outcome.failed.push((id, e.to_string()));
            }
        }
    }
    outcome
}

/// Entry point wiring the report, dataset and fact services over one set of
/// stores.
#[derive(Clone)]
pub struct Spa {
    pub reports: ReportService,
    pub datasets: DatasetService,
    pub facts: FactService,
}

impl Spa {
    pub fn new(stores: Stores, config: &SpaConfig) -> Self {
        let extractor = FactExtractor::new(config.extractor_options());
        let datasets = DatasetService::new(stores.clone(), extractor, config.parallelism);
        let reports = ReportService::new(
            stores.clone(),
            config.parser_options(),
            config.snap_time_formats.clone(),
            config.parallelism,
            datasets.clone(),
        );
        let facts = FactService::new(stores.facts);
        Self {
            reports,
            datasets,
            facts,
        }
    }

    pub fn in_memory(config: &SpaConfig) -> Self {
        Self::new(Stores::in_memory(), config)
    }

    /// SQLite metadata store plus filesystem blobs, as configured.
    pub async fn open(config: &SpaConfig) -> Result<Self, SpaError> {
        let backend = SqliteStore::new(SqliteConfig::new(&config.database_url)).await?;
        let blobs = FsBlobStore::new(&config.blob_dir).await?;
        info!(
            "Using database {} and blob directory {}",
            config.database_url,
            config.blob_dir.display()
        );
        Ok(Self::new(Stores::new(Arc::new(backend), Arc::new(blobs)), config))
    }
}
