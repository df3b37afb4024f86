pub mod config;
pub mod service;
pub mod types;

pub use config::SpaConfig;
pub use service::{BulkOutcome, Spa};
pub use types::{ExtractError, ParseError, SpaError, StoreError};
