//! Fact extraction from parsed reports and the read side over stored facts.

pub mod color;
pub mod extract;
pub mod lookup;
pub mod numeric;
pub mod query;
pub mod rules;
pub mod series;
pub mod types;

pub use extract::FactExtractor;
pub use query::{FactService, SqlSearch, SqlSearchHit};
pub use series::{assemble, assemble_table, ChartDataset, Series};
pub use types::{Dimension, Fact, FactQuery, FactValue};
