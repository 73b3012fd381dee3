//! JSON report adapter implementing ReportPort.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::PricelabError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), PricelabError> {
        let path = Path::new(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &result.document())
            .map_err(|e| PricelabError::Io(std::io::Error::other(e)))?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
