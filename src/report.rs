use chrono::{Duration, NaiveDateTime};
use log::{info, warn};
use uuid::Uuid;

use crate::awr::types::sections;
use crate::awr::{parse_into, ReportDocument, ReportSummary};
use crate::core::config::ParserOptions;
use crate::core::service::{run_bulk, BulkOutcome, Stores};
use crate::core::types::Result;
use crate::core::StoreError;
use crate::dataset::DatasetService;
use crate::facts::numeric::parse_snap_time;
use crate::storage::ReportFilter;

/// Width of the window `search` matches report starts against.
const SEARCH_WINDOW_SECS: i64 = 60;

/// Stored reports: ingest, listing, lookup and re-parse.
#[derive(Clone)]
pub struct ReportService {
    stores: Stores,
    parser_options: ParserOptions,
    snap_time_formats: Vec<String>,
    parallelism: usize,
    datasets: DatasetService,
}

impl ReportService {
    pub fn new(
        stores: Stores,
        parser_options: ParserOptions,
        snap_time_formats: Vec<String>,
        parallelism: usize,
        datasets: DatasetService,
    ) -> Self {
        Self {
            stores,
            parser_options,
            snap_time_formats,
            parallelism,
            datasets,
        }
    }

    fn start_of(&self, report: &ReportDocument) -> Option<NaiveDateTime> {
        let raw = report.value_at(sections::SNAPSHOT, 0, "Snap Time")?;
        let start = parse_snap_time(raw, &self.snap_time_formats);
        if start.is_none() {
            warn!("Report {} has unreadable snap time '{}'", report.id, raw);
        }
        start
    }

    /// Parses `document` from `bytes` off the async runtime and fills in its start.
    async fn parse_document(&self, bytes: Vec<u8>, document: ReportDocument) -> Result<ReportDocument> {
        let options = self.parser_options.clone();
        let mut parsed =
            tokio::task::spawn_blocking(move || parse_into(bytes.as_slice(), &options, document)).await??;
        parsed.start = self.start_of(&parsed);
        Ok(parsed)
    }

    /// Stores the raw bytes, parses them and saves the resulting document.
    /// A report that fails to parse leaves no blob behind.
    pub async fn ingest(&self, bytes: Vec<u8>, original_file_name: &str) -> Result<Uuid> {
        let blob_id = self.stores.blobs.put(&mut bytes.as_slice()).await?;

        let mut document = ReportDocument::new(original_file_name);
        document.blob_id = Some(blob_id);

        let document = match self.parse_document(bytes, document).await {
            Ok(document) => document,
            Err(e) => {
                self.stores.blobs.delete(blob_id).await?;
                return Err(e);
            }
        };

        self.stores.reports.insert_report(&document).await?;
        info!(
            "Ingested {} as report {} with {} sections",
            original_file_name,
            document.id,
            document.tables.len()
        );
        Ok(document.id)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ReportDocument>> {
        Ok(self.stores.reports.get_report(id).await?)
    }

    pub async fn list(&self, filter: &ReportFilter) -> Result<Vec<ReportSummary>> {
        let reports = self.stores.reports.list_reports(filter).await?;
        Ok(reports.iter().map(ReportSummary::from).collect())
    }

    /// Deletes the report and its blob, and drops it from every dataset it
    /// belongs to (regenerating their facts).
    pub async fn remove(&self, id: Uuid) -> Result<BulkOutcome> {
        let Some(report) = self.get(id).await? else {
            return Err(StoreError::NotFound {
                kind: "report",
                id: id.to_string(),
            }
            .into());
        };

        if let Some(blob_id) = report.blob_id {
            if !self.stores.blobs.delete(blob_id).await? {
                warn!("Blob {} of report {} was already gone", blob_id, id);
            }
        }

        self.stores.reports.delete_report(id).await?;

        let mut outcome = BulkOutcome::default();
        for dataset in self.datasets.find_by_report(id).await? {
            outcome.merge(self.datasets.unassign(dataset.id, &[id]).await?);
        }
        info!("Removed report {} ({})", id, report.original_file_name);
        Ok(outcome)
    }

    /// Raw bytes the report was parsed from.
    pub async fn original(&self, id: Uuid) -> Result<Option<Vec<u8>>> {
        let Some(blob_id) = self.get(id).await?.and_then(|r| r.blob_id) else {
            return Ok(None);
        };
        Ok(self.stores.blobs.get(blob_id).await?)
    }

    /// The report of `dataset_id` for `db_name`/`instance` whose start falls
    /// in `[at, at + 60s)`.
    pub async fn search(
        &self,
        dataset_id: Uuid,
        db_name: &str,
        instance: &str,
        at: NaiveDateTime,
    ) -> Result<Option<Uuid>> {
        let Some(dataset) = self.datasets.get(dataset_id).await? else {
            return Ok(None);
        };
        let until = at + Duration::seconds(SEARCH_WINDOW_SECS);

        let reports = self
            .stores
            .reports
            .list_reports(&ReportFilter::Only(dataset.report_ids))
            .await?;
        Ok(reports
            .into_iter()
            .find(|r| {
                let matches_instance = r.table(sections::DATABASE_INSTANCE).is_some_and(|t| {
                    t.data.iter().any(|row| {
                        row.get("DB Name").map(String::as_str) == Some(db_name)
                            && row.get("Instance").map(String::as_str) == Some(instance)
                    })
                });
                matches_instance && r.start.is_some_and(|s| s >= at && s < until)
            })
            .map(|r| r.id))
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(self.stores.reports.count_reports().await?)
    }

    async fn reparse(&self, id: Uuid) -> Result<()> {
        let report = self.get(id).await?.ok_or_else(|| StoreError::NotFound {
            kind: "report",
            id: id.to_string(),
        })?;
        let blob_id = report.blob_id.ok_or_else(|| StoreError::NotFound {
            kind: "blob of report",
            id: id.to_string(),
        })?;
        let bytes = self.stores.blobs.get(blob_id).await?.ok_or_else(|| StoreError::NotFound {
            kind: "blob",
            id: blob_id.to_string(),
        })?;

        let mut fresh = ReportDocument::new(report.original_file_name);
        fresh.id = report.id;
        fresh.blob_id = report.blob_id;
        fresh.parsed_at = report.parsed_at;

        let parsed = self.parse_document(bytes, fresh).await?;
        self.stores.reports.replace_report(&parsed).await?;
        Ok(())
    }

    /// Re-parses every stored report from its original bytes and replaces the
    /// document, keeping its identity.
    pub async fn reparse_all(&self) -> Result<BulkOutcome> {
        let ids: Vec<Uuid> = self
            .stores
            .reports
            .list_reports(&ReportFilter::All)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();

        let outcome = run_bulk(ids, self.parallelism, |id| {
            let service = self.clone();
            async move { service.reparse(id).await }
        })
        .await;
        info!(
            "Reparsed {} reports, {} failed",
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }
}
