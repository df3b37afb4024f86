use async_trait::async_trait;
use tokio::io::AsyncRead;
use uuid::Uuid;

use crate::awr::ReportDocument;
use crate::core::StoreError;
use crate::dataset::Dataset;
use crate::facts::{Fact, FactQuery};

/// Which stored reports a listing returns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ReportFilter {
    #[default]
    All,
    Only(Vec<Uuid>),
    Except(Vec<Uuid>),
}

impl ReportFilter {
    pub fn accepts(&self, id: &Uuid) -> bool {
        match self {
            ReportFilter::All => true,
            ReportFilter::Only(ids) => ids.contains(id),
            ReportFilter::Except(ids) => !ids.contains(id),
        }
    }
}

/// Parsed report documents keyed by id.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert_report(&self, report: &ReportDocument) -> Result<(), StoreError>;

    /// Overwrites an existing report; `NotFound` when the id is unknown.
    async fn replace_report(&self, report: &ReportDocument) -> Result<(), StoreError>;

    async fn get_report(&self, id: Uuid) -> Result<Option<ReportDocument>, StoreError>;

    /// Reports accepted by `filter`, in insertion order.
    async fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<ReportDocument>, StoreError>;

    async fn delete_report(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn count_reports(&self) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn insert_dataset(&self, dataset: &Dataset) -> Result<(), StoreError>;

    /// Overwrites an existing dataset; `NotFound` when the id is unknown.
    async fn update_dataset(&self, dataset: &Dataset) -> Result<(), StoreError>;

    async fn get_dataset(&self, id: Uuid) -> Result<Option<Dataset>, StoreError>;

    /// All datasets, oldest first.
    async fn list_datasets(&self) -> Result<Vec<Dataset>, StoreError>;

    async fn delete_dataset(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn count_datasets(&self) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait FactStore: Send + Sync {
    async fn insert_facts(&self, facts: &[Fact]) -> Result<(), StoreError>;

    /// Removes every fact of `dataset_id`, returning how many were dropped.
    async fn delete_facts(&self, dataset_id: Uuid) -> Result<u64, StoreError>;

    /// Facts accepted by `FactQuery::matches`, ordered by start. `limit` is
    /// left to the caller.
    async fn find_facts(&self, query: &FactQuery) -> Result<Vec<Fact>, StoreError>;
}

/// Raw uploaded report bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, reader: &mut (dyn AsyncRead + Unpin + Send)) -> Result<Uuid, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Vec<u8>>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// A backend holding reports, datasets and facts together.
#[async_trait]
pub trait StorageBackend: ReportStore + DatasetStore + FactStore {
    /// Configuration type specific to this storage implementation
    type Config;

    async fn new(config: Self::Config) -> Result<Self, StoreError>
    where
        Self: Sized;
}

pub mod blob;
pub mod memory;
pub mod sqlite;

pub use self::blob::{FsBlobStore, MemoryBlobStore};
pub use self::memory::MemoryStore;
pub use self::sqlite::{SqliteConfig, SqliteStore};
