//! File-based reporters for the batch counts.
//!
//! [`SummaryReporter`] writes a JSON document describing the whole batch.
//! [`GithubOutputReporter`] appends the counts as step outputs in the
//! format GitHub Actions reads from `$GITHUB_OUTPUT`:
//!
//! ```text
//! count=5
//! completed=4
//! failed=1
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::Reporter;
use crate::discovery::ImportFile;
use crate::orchestrator::{BatchResult, ImportOutcome};

/// Serializable view of a [`BatchResult`].
#[derive(Debug, Serialize)]
pub struct BatchSummary<'a> {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub success: bool,
    pub aborted: Option<String>,
    pub duration_secs: f64,
    pub finished_at: DateTime<Utc>,
    pub outcomes: &'a [ImportOutcome],
}

impl<'a> BatchSummary<'a> {
    pub fn new(result: &'a BatchResult) -> Self {
        Self {
            total: result.total,
            completed: result.completed,
            failed: result.failed,
            success: result.success(),
            aborted: result.abort.as_ref().map(|reason| reason.to_string()),
            duration_secs: result.duration.as_secs_f64(),
            finished_at: Utc::now(),
            outcomes: &result.outcomes,
        }
    }
}

/// Writes a JSON summary of the batch when it completes.
///
/// Parent directories are created automatically if they don't exist.
pub struct SummaryReporter {
    output_path: PathBuf,
}

impl SummaryReporter {
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }

    fn write(&self, result: &BatchResult) -> Result<()> {
        if let Some(parent) = self.output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&BatchSummary::new(result))?;
        std::fs::write(&self.output_path, json)
            .with_context(|| format!("Failed to write {}", self.output_path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl Reporter for SummaryReporter {
    async fn on_batch_start(&self, _files: &[ImportFile]) {}
    async fn on_import_complete(&self, _outcome: &ImportOutcome) {}

    async fn on_batch_complete(&self, result: &BatchResult) {
        match self.write(result) {
            Ok(()) => debug!("Wrote import summary to {}", self.output_path.display()),
            Err(e) => warn!("Failed to write import summary: {:#}", e),
        }
    }
}

/// Appends `count`, `completed` and `failed` to a GitHub Actions output file.
pub struct GithubOutputReporter {
    output_path: PathBuf,
}

impl GithubOutputReporter {
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }

    /// Uses the path from `$GITHUB_OUTPUT`, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var_os("GITHUB_OUTPUT")
            .filter(|path| !path.is_empty())
            .map(|path| Self::new(PathBuf::from(path)))
    }

    fn write(&self, result: &BatchResult) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)
            .with_context(|| format!("Failed to open {}", self.output_path.display()))?;

        writeln!(file, "count={}", result.total)?;
        writeln!(file, "completed={}", result.completed)?;
        writeln!(file, "failed={}", result.failed)?;
        Ok(())
    }
}

#[async_trait]
impl Reporter for GithubOutputReporter {
    async fn on_batch_start(&self, _files: &[ImportFile]) {}
    async fn on_import_complete(&self, _outcome: &ImportOutcome) {}

    async fn on_batch_complete(&self, result: &BatchResult) {
        if let Err(e) = self.write(result) {
            warn!("Failed to write step outputs: {:#}", e);
        }
    }
}
