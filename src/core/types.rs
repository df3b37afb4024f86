use thiserror::Error;

/// Failures while turning report markup into a `ReportDocument`.
/// Any of these aborts the parse; no partial document is produced.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Expected tag {expected}, got {found}")]
    Structural { expected: String, found: String },

    #[error("Empty tags stack at closing tag {found}")]
    EmptyStack { found: String },

    #[error("Malformed markup: {0}")]
    Markup(#[from] quick_xml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures while deriving facts from one report.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Cannot find section '{section}'")]
    MissingSection { section: String },

    #[error("Cannot find row with '{label}' at '{column}' in section '{section}'")]
    MissingRow {
        section: String,
        column: String,
        label: String,
    },

    #[error("Cannot find column '{column}' in section '{section}'")]
    MissingColumn { section: String, column: String },

    #[error("Not a number: '{value}'")]
    InvalidNumber { value: String },

    #[error("Not a snapshot time: '{value}'")]
    InvalidTime { value: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SpaError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T, E = SpaError> = std::result::Result<T, E>;
