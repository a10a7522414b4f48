//! Import orchestration.
//!
//! The orchestrator turns a list of result files into a [`BatchResult`]. It
//! decides the processing order, bounds concurrency, and carries the test
//! execution key discovered by a seed import into every later import.
//!
//! # Execution Flow
//!
//! ```text
//!   authenticate()
//!        │  fails ───────────────────────────────► abort (zero counts)
//!        ▼
//!   seed import?  (>1 file, no preset key, combine enabled)
//!        │ yes: import file[0] alone
//!        │      ├─ key       ──► importer.set_test_exec_key(key)
//!        │      ├─ no key    ──► abort
//!        │      └─ failure with continue_on_import_error = false ──► abort
//!        ▼
//!   fan-out: remaining files, input order, ≤ import_parallelism in flight
//!        │  failure with continue_on_import_error = false
//!        │      ──► stop submitting, let in-flight imports drain, abort
//!        ▼
//!   finalize: total / completed / failed / success
//! ```
//!
//! # Aborts During Fan-Out
//!
//! When an import fails and errors are not tolerated, no further file is
//! submitted, but imports already in flight are not cancelled. Which of
//! them finish before the abort is reported depends on timing: they are
//! always counted and recorded, but the number of files left unattempted is
//! not deterministic when `import_parallelism > 1`.
//!
//! # Example
//!
//! ```no_run
//! use xray_import::config::load_config;
//! use xray_import::discovery::discover_files;
//! use xray_import::importer::XrayCloud;
//! use xray_import::orchestrator::Orchestrator;
//! use xray_import::report::ConsoleReporter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config(std::path::Path::new("xray-import.toml"))?;
//!     let files = discover_files(&config.import.paths)?;
//!
//!     let importer = XrayCloud::new(&config.xray, config.import.clone())?;
//!     let mut orchestrator = Orchestrator::new(
//!         config.options.clone(),
//!         config.import.preset_test_exec_key(),
//!         importer,
//!         ConsoleReporter::new(false),
//!     );
//!
//!     let result = orchestrator.run(files).await;
//!     std::process::exit(result.exit_code());
//! }
//! ```

pub mod counters;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use futures::future;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ImportOptions;
use crate::discovery::ImportFile;
use crate::importer::{ImportError, Importer};
use crate::report::Reporter;

pub use counters::BatchCounters;

/// Why a batch stopped before every file was processed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbortReason {
    /// Authentication failed; no import was attempted.
    #[error("Failed to authenticate with Xray: {0}")]
    Authentication(String),

    /// An import failed while `continue_on_import_error` was disabled.
    #[error("Failed to import {}: {}", .path.display(), .error)]
    ImportFailed { path: PathBuf, error: String },

    /// The seed import did not produce a test execution key.
    #[error("Couldn't retrieve the test exec key by importing {}", .path.display())]
    MissingTestExecKey { path: PathBuf },
}

/// Result of importing a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ImportStatus {
    /// Xray accepted the file. `key` may be empty.
    Imported { key: String },
    /// Reading or importing the file failed.
    Failed { error: String },
}

/// The recorded outcome of one attempted import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub path: PathBuf,
    pub content_type: String,
    #[serde(flatten)]
    pub status: ImportStatus,
}

impl ImportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ImportStatus::Imported { .. })
    }

    /// The returned test execution key, if the import succeeded with one.
    pub fn key(&self) -> Option<&str> {
        match &self.status {
            ImportStatus::Imported { key } if !key.is_empty() => Some(key),
            _ => None,
        }
    }

    /// Applies the error policy to this outcome.
    ///
    /// A failure becomes an [`AbortReason::ImportFailed`] unless errors are
    /// tolerated, in which case it yields no key.
    fn escalate(&self, continue_on_import_error: bool) -> Result<Option<String>, AbortReason> {
        match &self.status {
            ImportStatus::Imported { key } => Ok(Some(key.clone())),
            ImportStatus::Failed { .. } if continue_on_import_error => Ok(None),
            ImportStatus::Failed { error } => Err(AbortReason::ImportFailed {
                path: self.path.clone(),
                error: error.clone(),
            }),
        }
    }
}

/// Aggregated result of a batch.
///
/// `completed + failed <= total` always holds. The two are equal unless
/// the batch was aborted.
///
/// # Exit Codes
///
/// | Code | Meaning |
/// |------|---------|
/// | 0 | Batch succeeded |
/// | 1 | Imports failed (with `fail_on_import_error`) or the batch was aborted |
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Number of files in the batch, including a seed file.
    pub total: usize,

    /// Number of files imported successfully.
    pub completed: usize,

    /// Number of files whose read or import failed.
    pub failed: usize,

    /// Set when the batch stopped early.
    pub abort: Option<AbortReason>,

    /// Whether any failed import fails the batch.
    pub fail_on_import_error: bool,

    /// Wall-clock duration of the batch.
    pub duration: Duration,

    /// Outcomes of every attempted import, in completion order.
    pub outcomes: Vec<ImportOutcome>,
}

impl BatchResult {
    /// Number of files that were attempted.
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }

    /// Returns `true` if the batch counts as successful.
    ///
    /// A batch fails when authentication failed, when it was aborted before
    /// every file was processed, or when imports failed and
    /// `fail_on_import_error` is set.
    ///
    /// ```
    /// use std::time::Duration;
    /// use xray_import::orchestrator::BatchResult;
    ///
    /// let result = BatchResult {
    ///     total: 4,
    ///     completed: 3,
    ///     failed: 1,
    ///     abort: None,
    ///     fail_on_import_error: false,
    ///     duration: Duration::from_secs(2),
    ///     outcomes: vec![],
    /// };
    /// assert!(result.success());
    /// ```
    pub fn success(&self) -> bool {
        match &self.abort {
            Some(AbortReason::Authentication(_)) => return false,
            Some(_) if self.processed() < self.total => return false,
            _ => {}
        }
        !(self.failed > 0 && self.fail_on_import_error)
    }

    pub fn exit_code(&self) -> i32 {
        if self.success() { 0 } else { 1 }
    }
}

/// Coordinates the import of a batch of files.
///
/// # Type Parameters
///
/// - `I`: The importer talking to Xray
/// - `R`: The reporter receiving progress events
pub struct Orchestrator<I, R> {
    options: ImportOptions,
    preset_test_exec_key: Option<String>,
    importer: I,
    reporter: R,
}

impl<I, R> Orchestrator<I, R>
where
    I: Importer,
    R: Reporter,
{
    /// Creates a new orchestrator.
    ///
    /// # Arguments
    ///
    /// * `options` - Orchestration policy
    /// * `preset_test_exec_key` - Test execution configured up front; disables the seed import
    /// * `importer` - Importer for the selected Xray variant
    /// * `reporter` - Reporter for progress and the final result
    pub fn new(
        options: ImportOptions,
        preset_test_exec_key: Option<String>,
        importer: I,
        reporter: R,
    ) -> Self {
        Self {
            options,
            preset_test_exec_key: preset_test_exec_key.filter(|k| !k.trim().is_empty()),
            importer,
            reporter,
        }
    }

    pub fn importer(&self) -> &I {
        &self.importer
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Whether the first file is imported alone to create the execution.
    fn needs_seed_import(&self, file_count: usize) -> bool {
        file_count > 1
            && self.preset_test_exec_key.is_none()
            && self.options.combine_in_single_test_exec
    }

    /// Imports the given files and returns the batch result.
    ///
    /// Always returns a result: fatal conditions are recorded in
    /// [`BatchResult::abort`] alongside the counts gathered so far.
    pub async fn run(&mut self, files: Vec<ImportFile>) -> BatchResult {
        let start = Instant::now();
        let total = files.len();
        let counters = BatchCounters::new();
        let mut outcomes = Vec::with_capacity(total);

        info!("Connecting to Xray using {}", self.importer.name());
        let abort = match self.importer.authenticate().await {
            Ok(()) => {
                info!("Authenticated with Xray");
                if files.is_empty() {
                    warn!("No files to import");
                }
                self.reporter.on_batch_start(&files).await;
                self.import_all(files, &counters, &mut outcomes).await.err()
            }
            Err(e) => Some(AbortReason::Authentication(e.to_string())),
        };

        match &abort {
            Some(reason @ AbortReason::Authentication(_)) => error!("{}", reason),
            Some(reason) => warn!("Stopped import ({})", reason),
            None => {}
        }

        let result = BatchResult {
            total,
            completed: counters.completed(),
            failed: counters.failed(),
            abort,
            fail_on_import_error: self.options.fail_on_import_error,
            duration: start.elapsed(),
            outcomes,
        };

        info!(
            "Processed {} of {} files. Failed to import: {}",
            result.completed, result.total, result.failed
        );
        if result.failed > 0 && result.fail_on_import_error {
            error!("{} failed imports detected", result.failed);
        }

        self.reporter.on_batch_complete(&result).await;
        result
    }

    async fn import_all(
        &mut self,
        mut files: Vec<ImportFile>,
        counters: &BatchCounters,
        outcomes: &mut Vec<ImportOutcome>,
    ) -> Result<(), AbortReason> {
        if self.needs_seed_import(files.len()) {
            let seed = files.remove(0);
            self.seed_import(&seed, counters, outcomes).await?;
        }

        self.fan_out(files, counters, outcomes).await
    }

    /// Imports the seed file alone and applies its key to the importer.
    async fn seed_import(
        &mut self,
        seed: &ImportFile,
        counters: &BatchCounters,
        outcomes: &mut Vec<ImportOutcome>,
    ) -> Result<(), AbortReason> {
        debug!(
            "Importing {} first to create a test execution",
            seed.path.display()
        );

        let outcome = import_file(&self.importer, seed, counters).await;
        self.reporter.on_import_complete(&outcome).await;
        let escalated = outcome.escalate(self.options.continue_on_import_error);
        outcomes.push(outcome);

        match escalated?.filter(|key| !key.is_empty()) {
            Some(key) => {
                info!("Importing remaining files into test execution {}", key);
                self.importer.set_test_exec_key(key);
                Ok(())
            }
            None => Err(AbortReason::MissingTestExecKey {
                path: seed.path.clone(),
            }),
        }
    }

    /// Imports files with at most `import_parallelism` in flight.
    async fn fan_out(
        &self,
        files: Vec<ImportFile>,
        counters: &BatchCounters,
        outcomes: &mut Vec<ImportOutcome>,
    ) -> Result<(), AbortReason> {
        let parallelism = self.options.import_parallelism.max(1);
        let continue_on_error = self.options.continue_on_import_error;
        let importer = &self.importer;
        let stop = CancellationToken::new();
        let stop = &stop;

        debug!(
            "Importing {} files with parallelism {}",
            files.len(),
            parallelism
        );

        // Checked before each submission; in-flight imports are left to finish.
        let mut completions = stream::iter(files)
            .take_while(|_| future::ready(!stop.is_cancelled()))
            .map(move |file| async move {
                let outcome = import_file(importer, &file, counters).await;
                if !outcome.is_success() && !continue_on_error {
                    stop.cancel();
                }
                outcome
            })
            .buffer_unordered(parallelism);

        let mut abort = None;
        while let Some(outcome) = completions.next().await {
            self.reporter.on_import_complete(&outcome).await;
            if let Err(reason) = outcome.escalate(continue_on_error) {
                abort.get_or_insert(reason);
            }
            outcomes.push(outcome);
        }

        match abort {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

/// Reads one file and imports it, updating the counters.
async fn import_file<I: Importer>(
    importer: &I,
    file: &ImportFile,
    counters: &BatchCounters,
) -> ImportOutcome {
    debug!("Importing {} as {}", file.path.display(), file.content_type);

    let result = match tokio::fs::read(&file.path).await {
        Ok(content) => importer.import(content, &file.content_type).await,
        Err(e) => Err(ImportError::Io(e)),
    };

    let status = match result {
        Ok(key) => {
            counters.record_completed();
            info!("Imported {} ({})", file.path.display(), key);
            ImportStatus::Imported { key }
        }
        Err(e) => {
            counters.record_failed();
            warn!("Failed to import {} ({})", file.path.display(), e);
            ImportStatus::Failed {
                error: e.to_string(),
            }
        }
    };

    ImportOutcome {
        path: file.path.clone(),
        content_type: file.content_type.clone(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::ImportResult;
    use crate::report::NullReporter;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// One call to `MockImporter::import`.
    #[derive(Debug, Clone)]
    struct Call {
        content: String,
        test_exec_key: Option<String>,
    }

    #[derive(Default)]
    struct MockState {
        calls: Mutex<Vec<Call>>,
        keys_set: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    struct MockImporter {
        state: Arc<MockState>,
        fail_auth: bool,
        failing: HashSet<String>,
        returned_key: String,
        delay: Duration,
        test_exec_key: Option<String>,
    }

    impl MockImporter {
        fn new(state: Arc<MockState>) -> Self {
            Self {
                state,
                fail_auth: false,
                failing: HashSet::new(),
                returned_key: "PROJ-1".to_string(),
                delay: Duration::from_millis(5),
                test_exec_key: None,
            }
        }

        fn failing(mut self, contents: &[&str]) -> Self {
            self.failing = contents.iter().map(|c| c.to_string()).collect();
            self
        }

        fn returning(mut self, key: &str) -> Self {
            self.returned_key = key.to_string();
            self
        }
    }

    #[async_trait]
    impl Importer for MockImporter {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn authenticate(&mut self) -> ImportResult<()> {
            if self.fail_auth {
                return Err(ImportError::Authentication("bad credentials".to_string()));
            }
            Ok(())
        }

        async fn import(&self, content: Vec<u8>, _content_type: &str) -> ImportResult<String> {
            let content = String::from_utf8_lossy(&content).to_string();
            self.state.calls.lock().unwrap().push(Call {
                content: content.clone(),
                test_exec_key: self.test_exec_key.clone(),
            });

            let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.state.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(&content) {
                return Err(ImportError::Rejected {
                    status: 400,
                    body: format!("{} rejected", content),
                });
            }
            Ok(self.returned_key.clone())
        }

        fn set_test_exec_key(&mut self, key: String) {
            self.state.keys_set.lock().unwrap().push(key.clone());
            self.test_exec_key = Some(key);
        }
    }

    /// Writes `count` files whose content is `file-<n>`.
    fn write_files(dir: &TempDir, count: usize) -> Vec<ImportFile> {
        (0..count)
            .map(|i| {
                let path = dir.path().join(format!("result-{}.xml", i));
                std::fs::write(&path, format!("file-{}", i)).unwrap();
                ImportFile::new(path)
            })
            .collect()
    }

    fn options(combine: bool, continue_on_error: bool, parallelism: usize) -> ImportOptions {
        ImportOptions {
            combine_in_single_test_exec: combine,
            fail_on_import_error: true,
            continue_on_import_error: continue_on_error,
            import_parallelism: parallelism,
        }
    }

    fn calls(state: &MockState) -> Vec<Call> {
        state.calls.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_seed_then_fan_out() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 5);
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone());

        let mut orchestrator =
            Orchestrator::new(options(true, true, 2), None, importer, NullReporter);
        let result = orchestrator.run(files).await;

        assert_eq!(result.total, 5);
        assert_eq!(result.completed, 5);
        assert_eq!(result.failed, 0);
        assert!(result.abort.is_none());
        assert!(result.success());

        let calls = calls(&state);
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0].content, "file-0");
        assert_eq!(calls[0].test_exec_key, None);
        assert!(
            calls[1..]
                .iter()
                .all(|c| c.test_exec_key.as_deref() == Some("PROJ-1"))
        );
        assert_eq!(*state.keys_set.lock().unwrap(), vec!["PROJ-1".to_string()]);
        assert!(state.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_fan_out_respects_parallelism() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 8);
        let state = Arc::new(MockState::default());
        let mut importer = MockImporter::new(state.clone());
        importer.delay = Duration::from_millis(20);

        let mut orchestrator =
            Orchestrator::new(options(false, true, 3), None, importer, NullReporter);
        let result = orchestrator.run(files).await;

        assert_eq!(result.completed, 8);
        assert_eq!(state.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_files_submitted_in_input_order() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 4);
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone());

        let mut orchestrator =
            Orchestrator::new(options(false, true, 1), None, importer, NullReporter);
        orchestrator.run(files).await;

        let order: Vec<_> = calls(&state).into_iter().map(|c| c.content).collect();
        assert_eq!(order, vec!["file-0", "file-1", "file-2", "file-3"]);
    }

    #[tokio::test]
    async fn test_single_file_skips_seed() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 1);
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone()).returning("");

        let mut orchestrator =
            Orchestrator::new(options(true, false, 2), None, importer, NullReporter);
        let result = orchestrator.run(files).await;

        assert_eq!(result.total, 1);
        assert_eq!(result.completed, 1);
        assert!(result.abort.is_none());
        assert!(state.keys_set.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preset_key_skips_seed() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 3);
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone()).returning("");

        let mut orchestrator = Orchestrator::new(
            options(true, true, 2),
            Some("PROJ-9".to_string()),
            importer,
            NullReporter,
        );
        let result = orchestrator.run(files).await;

        assert_eq!(result.completed, 3);
        assert!(result.abort.is_none());
        assert!(state.keys_set.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_combine_disabled_skips_seed() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 3);
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone());

        let mut orchestrator =
            Orchestrator::new(options(false, true, 2), None, importer, NullReporter);
        let result = orchestrator.run(files).await;

        assert_eq!(result.completed, 3);
        assert!(state.keys_set.lock().unwrap().is_empty());
        assert!(calls(&state).iter().all(|c| c.test_exec_key.is_none()));
    }

    #[tokio::test]
    async fn test_seed_without_key_aborts() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 5);
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone()).returning("");

        let mut orchestrator =
            Orchestrator::new(options(true, true, 2), None, importer, NullReporter);
        let result = orchestrator.run(files).await;

        assert_eq!(calls(&state).len(), 1);
        assert_eq!(result.total, 5);
        assert_eq!(result.completed, 1);
        assert_eq!(result.failed, 0);
        assert!(matches!(
            result.abort,
            Some(AbortReason::MissingTestExecKey { .. })
        ));
        assert!(!result.success());
        assert_eq!(result.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_seed_failure_stops_batch() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 5);
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone()).failing(&["file-0"]);

        let mut options = options(true, false, 2);
        options.fail_on_import_error = false;
        let mut orchestrator = Orchestrator::new(options, None, importer, NullReporter);
        let result = orchestrator.run(files).await;

        assert_eq!(calls(&state).len(), 1);
        assert_eq!(result.total, 5);
        assert_eq!(result.completed, 0);
        assert_eq!(result.failed, 1);
        assert!(matches!(result.abort, Some(AbortReason::ImportFailed { .. })));
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_tolerated_seed_failure_still_needs_key() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 3);
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone()).failing(&["file-0"]);

        let mut orchestrator =
            Orchestrator::new(options(true, true, 2), None, importer, NullReporter);
        let result = orchestrator.run(files).await;

        assert_eq!(calls(&state).len(), 1);
        assert_eq!(result.failed, 1);
        assert!(matches!(
            result.abort,
            Some(AbortReason::MissingTestExecKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_continue_on_error_attempts_every_file() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 5);
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone()).failing(&["file-1", "file-3"]);

        let mut orchestrator =
            Orchestrator::new(options(false, true, 2), None, importer, NullReporter);
        let result = orchestrator.run(files).await;

        assert_eq!(calls(&state).len(), 5);
        assert_eq!(result.completed, 3);
        assert_eq!(result.failed, 2);
        assert_eq!(result.processed(), result.total);
        assert!(result.abort.is_none());
        assert!(!result.success());
        assert_eq!(result.outcomes.len(), 5);
        assert_eq!(result.outcomes.iter().filter(|o| !o.is_success()).count(), 2);
    }

    #[tokio::test]
    async fn test_failures_tolerated_without_fail_on_import_error() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 3);
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone()).failing(&["file-2"]);

        let mut options = options(false, true, 2);
        options.fail_on_import_error = false;
        let mut orchestrator = Orchestrator::new(options, None, importer, NullReporter);
        let result = orchestrator.run(files).await;

        assert_eq!(result.failed, 1);
        assert!(result.success());
        assert_eq!(result.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_fan_out_failure_stops_scheduling() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 5);
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone()).failing(&["file-1"]);

        let mut orchestrator =
            Orchestrator::new(options(false, false, 1), None, importer, NullReporter);
        let result = orchestrator.run(files).await;

        assert_eq!(calls(&state).len(), 2);
        assert_eq!(result.total, 5);
        assert_eq!(result.completed, 1);
        assert_eq!(result.failed, 1);
        assert!(result.processed() < result.total);
        assert!(matches!(result.abort, Some(AbortReason::ImportFailed { .. })));
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_fan_out_failure_drains_in_flight() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 10);
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone()).failing(&["file-0"]);

        let mut orchestrator =
            Orchestrator::new(options(false, false, 3), None, importer, NullReporter);
        let result = orchestrator.run(files).await;

        // Everything that was started is recorded, nothing new after the failure.
        let attempted = calls(&state).len();
        assert!(attempted >= 1 && attempted < 10);
        assert_eq!(result.processed(), attempted);
        assert_eq!(result.outcomes.len(), attempted);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_unreadable_file_counts_as_failure() {
        let dir = TempDir::new().unwrap();
        let mut files = write_files(&dir, 2);
        files.push(ImportFile::new(dir.path().join("missing.xml")));
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone());

        let mut orchestrator =
            Orchestrator::new(options(false, true, 2), None, importer, NullReporter);
        let result = orchestrator.run(files).await;

        assert_eq!(calls(&state).len(), 2);
        assert_eq!(result.completed, 2);
        assert_eq!(result.failed, 1);
        let failed = result.outcomes.iter().find(|o| !o.is_success()).unwrap();
        assert!(failed.path.ends_with("missing.xml"));
    }

    #[tokio::test]
    async fn test_authentication_failure_imports_nothing() {
        let dir = TempDir::new().unwrap();
        let files = write_files(&dir, 3);
        let state = Arc::new(MockState::default());
        let mut importer = MockImporter::new(state.clone());
        importer.fail_auth = true;

        let mut orchestrator =
            Orchestrator::new(options(true, true, 2), None, importer, NullReporter);
        let result = orchestrator.run(files).await;

        assert!(calls(&state).is_empty());
        assert_eq!(result.total, 3);
        assert_eq!(result.completed, 0);
        assert_eq!(result.failed, 0);
        assert!(matches!(result.abort, Some(AbortReason::Authentication(_))));
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds() {
        let state = Arc::new(MockState::default());
        let importer = MockImporter::new(state.clone());

        let mut orchestrator =
            Orchestrator::new(options(true, false, 2), None, importer, NullReporter);
        let result = orchestrator.run(Vec::new()).await;

        assert_eq!(result.total, 0);
        assert!(result.success());
    }

    #[test]
    fn test_outcome_escalation() {
        let ok = ImportOutcome {
            path: PathBuf::from("a.xml"),
            content_type: "application/xml".to_string(),
            status: ImportStatus::Imported {
                key: "PROJ-1".to_string(),
            },
        };
        assert_eq!(ok.key(), Some("PROJ-1"));
        assert_eq!(ok.escalate(false), Ok(Some("PROJ-1".to_string())));

        let failed = ImportOutcome {
            status: ImportStatus::Failed {
                error: "boom".to_string(),
            },
            ..ok
        };
        assert_eq!(failed.key(), None);
        assert_eq!(failed.escalate(true), Ok(None));
        assert_eq!(
            failed.escalate(false),
            Err(AbortReason::ImportFailed {
                path: PathBuf::from("a.xml"),
                error: "boom".to_string(),
            })
        );
    }
}
