//! Report files written at the end of a run.

pub mod report;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Json,
    Html,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "plain" | "text" | "txt" => Some(Self::Plain),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Plain);
    }
    None
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

/// One discovered path as it appears in a report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub status: u16,
    pub path: String,
    pub content_length: Option<u64>,
}

/// Destination for findings that outlives the console.
pub trait ReportSink: Send {
    fn add_path(&mut self, status: u16, path: &str, content_length: Option<u64>);
    fn save(&mut self) -> Result<(), ReportError>;
    fn close(&mut self) -> Result<(), ReportError>;
}

/// File-backed sink rendering the collected entries on every save.
pub struct FileReport {
    format: OutputFormat,
    path: PathBuf,
    base_url: String,
    entries: Vec<ReportEntry>,
}

impl FileReport {
    /// `base_url` is `scheme://host:port/basePath/` and prefixes every path.
    pub fn new(format: OutputFormat, path: impl AsRef<Path>, base_url: impl Into<String>) -> Self {
        Self {
            format,
            path: path.as_ref().to_path_buf(),
            base_url: base_url.into(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    fn render(&self) -> Result<Vec<u8>, ReportError> {
        match self.format {
            OutputFormat::Plain => Ok(report::render_plain(&self.base_url, &self.entries)),
            OutputFormat::Json => report::render_json(&self.base_url, &self.entries)
                .map_err(|e| ReportError::Serialize { source: e }),
            OutputFormat::Html => Ok(report::render_html(&self.base_url, &self.entries)),
        }
    }

    fn io_err(&self, source: std::io::Error) -> ReportError {
        ReportError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl ReportSink for FileReport {
    fn add_path(&mut self, status: u16, path: &str, content_length: Option<u64>) {
        self.entries.push(ReportEntry {
            status,
            path: path.to_string(),
            content_length,
        });
    }

    fn save(&mut self) -> Result<(), ReportError> {
        let data = self.render()?;
        let mut file = File::create(&self.path).map_err(|e| self.io_err(e))?;
        file.write_all(&data).map_err(|e| self.io_err(e))?;
        file.flush().map_err(|e| self.io_err(e))
    }

    fn close(&mut self) -> Result<(), ReportError> {
        Ok(())
    }
}
