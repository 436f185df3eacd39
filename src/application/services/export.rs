//! Frame serialization (CSV, Arrow IPC stream).

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use arrow::csv::WriterBuilder;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::application::{ApplicationResult, IoResultExt};
use crate::infrastructure::traits::FileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Ipc,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => f.write_str("csv"),
            ExportFormat::Ipc => f.write_str("ipc"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "ipc" | "arrow" => Ok(ExportFormat::Ipc),
            other => Err(format!("unknown export format '{}' (csv, ipc)", other)),
        }
    }
}

/// Serialize a frame to CSV with a header line.
pub fn record_batch_to_csv(batch: &RecordBatch) -> ApplicationResult<Vec<u8>> {
    let mut writer = WriterBuilder::new().with_header(true).build(Vec::new());
    writer.write(batch)?;
    Ok(writer.into_inner())
}

/// Serialize a frame to Arrow IPC stream bytes.
pub fn record_batch_to_ipc(batch: &RecordBatch) -> ApplicationResult<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buf, &batch.schema())?;
        writer.write(batch)?;
        writer.finish()?;
    }
    Ok(buf)
}

pub fn encode(batch: &RecordBatch, format: ExportFormat) -> ApplicationResult<Vec<u8>> {
    match format {
        ExportFormat::Csv => record_batch_to_csv(batch),
        ExportFormat::Ipc => record_batch_to_ipc(batch),
    }
}

/// Service writing frames to files.
pub struct ExportService {
    fs: Arc<dyn FileSystem>,
}

impl ExportService {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    #[instrument(level = "debug", skip(self, batch))]
    pub fn export(&self, batch: &RecordBatch, path: &Path, format: ExportFormat) -> ApplicationResult<()> {
        let bytes = encode(batch, format)?;
        self.fs
            .ensure_parent(path)
            .with_path_context("create parent directory", path)?;
        self.fs
            .write(path, &bytes)
            .with_path_context("write frame", path)?;
        info!(
            "wrote {} rows x {} columns to {} ({})",
            batch.num_rows(),
            batch.num_columns(),
            path.display(),
            format
        );
        Ok(())
    }
}
