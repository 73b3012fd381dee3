//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_report_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
#[cfg(feature = "web")]
pub mod web;
#[cfg(feature = "yahoo")]
pub mod yahoo_adapter;

use std::path::PathBuf;

use crate::domain::config_validation::{source_provider, validate_source_config};
use crate::domain::error::PricelabError;
use crate::ports::config_port::ConfigPort;
use crate::ports::quote_port::QuoteSource;

/// Build the quote source named by `[source] provider`.
pub fn quote_source_from_config(
    config: &dyn ConfigPort,
) -> Result<Box<dyn QuoteSource + Send + Sync>, PricelabError> {
    validate_source_config(config)?;

    match source_provider(config).as_str() {
        "csv" => {
            let dir = config.get_non_empty("source", "csv_dir").ok_or_else(|| {
                PricelabError::ConfigMissing {
                    section: "source".into(),
                    key: "csv_dir".into(),
                }
            })?;
            Ok(Box::new(csv_adapter::CsvAdapter::new(PathBuf::from(dir))))
        }
        #[cfg(feature = "yahoo")]
        "yahoo" => Ok(Box::new(yahoo_adapter::YahooAdapter::from_config(config)?)),
        other => Err(PricelabError::ConfigInvalid {
            section: "source".into(),
            key: "provider".into(),
            reason: format!("provider '{other}' is not available in this build"),
        }),
    }
}
