//! AWR HTML report parsing: markup events in, `ReportDocument` out.

pub mod alias;
pub mod parser;
pub mod sanitize;
pub mod tokenizer;
pub mod types;

pub use alias::AliasTable;
pub use parser::{parse, parse_into, ReportParser};
pub use tokenizer::{TagEvent, Tokenizer};
pub use types::{ReportDocument, ReportSummary, Row, Summary, Table};
