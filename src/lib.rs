pub mod awr;
pub mod core;
pub mod dataset;
pub mod facts;
pub mod report;
pub mod storage;

// Re-exports
pub use crate::core::{BulkOutcome, Spa, SpaConfig, SpaError};
pub use awr::{parse, ReportDocument};
pub use dataset::Dataset;
pub use facts::{ChartDataset, Fact, FactQuery};
