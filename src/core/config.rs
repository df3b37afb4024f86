use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::awr::alias::AliasTable;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://spa.db";
pub const DEFAULT_BLOB_DIR: &str = "data/blobs";
pub const DEFAULT_PARALLELISM: usize = 4;

/// Formats tried in order when reading a "Snap Time" cell.
pub const DEFAULT_SNAP_TIME_FORMATS: &[&str] = &[
    "%d-%b-%y %H:%M:%S",
    "%d-%b-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

#[derive(Clone, Debug)]
pub struct SpaConfig {
    pub database_url: String,
    pub blob_dir: PathBuf,
    pub parallelism: usize,
    pub input_encoding: Option<String>,
    pub snap_time_formats: Vec<String>,
}

impl Default for SpaConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            blob_dir: PathBuf::from(DEFAULT_BLOB_DIR),
            parallelism: DEFAULT_PARALLELISM,
            input_encoding: None,
            snap_time_formats: DEFAULT_SNAP_TIME_FORMATS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }
}

impl SpaConfig {
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine, the environment may carry everything.
        dotenv::dotenv().ok();

        let mut config = Self::default();

        if let Ok(url) = std::env::var("SPA_DATABASE_URL") {
            config.database_url = url;
        }

        if let Ok(dir) = std::env::var("SPA_BLOB_DIR") {
            config.blob_dir = PathBuf::from(dir);
        }

        if let Ok(value) = std::env::var("SPA_PARALLELISM") {
            let parallelism: usize = value
                .parse()
                .map_err(|_| anyhow!("SPA_PARALLELISM must be a positive integer, got {}", value))?;
            if parallelism == 0 {
                return Err(anyhow!("SPA_PARALLELISM must be at least 1"));
            }
            config.parallelism = parallelism;
        }

        if let Ok(label) = std::env::var("SPA_INPUT_ENCODING") {
            if encoding_rs::Encoding::for_label(label.as_bytes()).is_none() {
                return Err(anyhow!("Unknown input encoding: {}", label));
            }
            config.input_encoding = Some(label);
        }

        if let Ok(formats) = std::env::var("SPA_SNAP_TIME_FORMATS") {
            config.snap_time_formats = formats
                .split(';')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }

    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            header_aliases: AliasTable::column_headers(),
            encoding: self
                .input_encoding
                .as_deref()
                .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes())),
        }
    }

    pub fn extractor_options(&self) -> ExtractorOptions {
        ExtractorOptions {
            metric_aliases: AliasTable::metric_names(),
            snap_time_formats: self.snap_time_formats.clone(),
        }
    }
}

/// Immutable settings handed to every `ReportParser`.
#[derive(Clone, Debug)]
pub struct ParserOptions {
    pub header_aliases: AliasTable,
    pub encoding: Option<&'static encoding_rs::Encoding>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        SpaConfig::default().parser_options()
    }
}

/// Immutable settings handed to every `FactExtractor`.
#[derive(Clone, Debug)]
pub struct ExtractorOptions {
    pub metric_aliases: AliasTable,
    pub snap_time_formats: Vec<String>,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        SpaConfig::default().extractor_options()
    }
}
