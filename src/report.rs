//! Import progress and result reporting.
//!
//! Reporters receive events while a batch runs and publish the final
//! counts. The batch result is always reported, including for aborted
//! batches, so every sink sees total / completed / failed.
//!
//! | Reporter | Output |
//! |----------|--------|
//! | [`ConsoleReporter`] | Progress bar and colored summary |
//! | [`SummaryReporter`] | JSON summary file |
//! | [`GithubOutputReporter`] | `count` / `completed` / `failed` step outputs |
//! | [`NullReporter`] | Nothing |

pub mod summary;

use async_trait::async_trait;

use crate::discovery::ImportFile;
use crate::orchestrator::{BatchResult, ImportOutcome, ImportStatus};

pub use summary::{BatchSummary, GithubOutputReporter, SummaryReporter};

/// An import reporter receives events during a batch.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Called after authentication, with every file of the batch.
    async fn on_batch_start(&self, files: &[ImportFile]);

    /// Called once per attempted file, in completion order.
    async fn on_import_complete(&self, outcome: &ImportOutcome);

    /// Called once at the end of every batch, aborted or not.
    async fn on_batch_complete(&self, result: &BatchResult);
}

/// A reporter that does nothing (for testing or when output is not needed).
pub struct NullReporter;

#[async_trait]
impl Reporter for NullReporter {
    async fn on_batch_start(&self, _files: &[ImportFile]) {}
    async fn on_import_complete(&self, _outcome: &ImportOutcome) {}
    async fn on_batch_complete(&self, _result: &BatchResult) {}
}

/// A reporter that combines multiple reporters.
pub struct MultiReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl MultiReporter {
    /// Create a new multi-reporter.
    pub fn new() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    /// Add a reporter to the multi-reporter.
    pub fn with_reporter<R: Reporter + 'static>(mut self, reporter: R) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }
}

impl Default for MultiReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reporter for MultiReporter {
    async fn on_batch_start(&self, files: &[ImportFile]) {
        for reporter in &self.reporters {
            reporter.on_batch_start(files).await;
        }
    }

    async fn on_import_complete(&self, outcome: &ImportOutcome) {
        for reporter in &self.reporters {
            reporter.on_import_complete(outcome).await;
        }
    }

    async fn on_batch_complete(&self, result: &BatchResult) {
        for reporter in &self.reporters {
            reporter.on_batch_complete(result).await;
        }
    }
}

/// Console reporter that shows import progress in the terminal.
pub struct ConsoleReporter {
    progress: std::sync::Mutex<Option<indicatif::ProgressBar>>,
    verbose: bool,
}

impl ConsoleReporter {
    /// Create a new console reporter.
    pub fn new(verbose: bool) -> Self {
        Self {
            progress: std::sync::Mutex::new(None),
            verbose,
        }
    }
}

#[async_trait]
impl Reporter for ConsoleReporter {
    async fn on_batch_start(&self, files: &[ImportFile]) {
        println!("Importing {} files", files.len());

        let pb = indicatif::ProgressBar::new(files.len() as u64);
        pb.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        if let Ok(mut progress) = self.progress.lock() {
            *progress = Some(pb);
        }
    }

    async fn on_import_complete(&self, outcome: &ImportOutcome) {
        let Ok(progress) = self.progress.lock() else {
            return;
        };
        let Some(pb) = progress.as_ref() else {
            return;
        };
        pb.inc(1);

        match &outcome.status {
            ImportStatus::Imported { key } if self.verbose => pb.println(format!(
                "{} {} ({})",
                console::style("OK  ").green(),
                outcome.path.display(),
                key
            )),
            ImportStatus::Imported { .. } => {}
            ImportStatus::Failed { error } => pb.println(format!(
                "{} {}\n     {}",
                console::style("FAIL").red(),
                outcome.path.display(),
                console::style(error).dim()
            )),
        }
    }

    async fn on_batch_complete(&self, result: &BatchResult) {
        if let Ok(mut progress) = self.progress.lock()
            && let Some(pb) = progress.take()
        {
            pb.finish_and_clear();
        }

        println!();
        println!("Import Results:");
        println!("  Total:     {}", result.total);
        println!("  Completed: {}", console::style(result.completed).green());
        println!("  Failed:    {}", console::style(result.failed).red());

        let skipped = result.total.saturating_sub(result.processed());
        if skipped > 0 {
            println!("  Not Run:   {}", console::style(skipped).red().bold());
        }

        println!("  Duration:  {:?}", result.duration);

        println!();
        if let Some(reason) = &result.abort {
            println!("{}", console::style(format!("Import stopped: {}", reason)).red().bold());
        } else if result.success() && result.failed == 0 {
            println!("{}", console::style("All files imported!").green().bold());
        } else if result.success() {
            println!(
                "{}",
                console::style("Some imports failed (tolerated).").yellow().bold()
            );
        } else {
            println!(
                "{}",
                console::style(format!("{} failed imports detected.", result.failed))
                    .red()
                    .bold()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    struct RecordingReporter(Arc<Events>);

    #[async_trait]
    impl Reporter for RecordingReporter {
        async fn on_batch_start(&self, files: &[ImportFile]) {
            self.0.0.lock().unwrap().push(format!("start:{}", files.len()));
        }
        async fn on_import_complete(&self, outcome: &ImportOutcome) {
            self.0
                .0
                .lock()
                .unwrap()
                .push(format!("file:{}", outcome.path.display()));
        }
        async fn on_batch_complete(&self, result: &BatchResult) {
            self.0.0.lock().unwrap().push(format!("done:{}", result.total));
        }
    }

    #[tokio::test]
    async fn test_multi_reporter_forwards_to_all() {
        let first = Arc::new(Events::default());
        let second = Arc::new(Events::default());
        let multi = MultiReporter::new()
            .with_reporter(RecordingReporter(first.clone()))
            .with_reporter(NullReporter)
            .with_reporter(RecordingReporter(second.clone()));

        let files = vec![ImportFile::new("a.xml")];
        let outcome = ImportOutcome {
            path: PathBuf::from("a.xml"),
            content_type: "application/xml".to_string(),
            status: ImportStatus::Imported {
                key: "PROJ-1".to_string(),
            },
        };
        let result = BatchResult {
            total: 1,
            completed: 1,
            failed: 0,
            abort: None,
            fail_on_import_error: true,
            duration: Duration::from_millis(10),
            outcomes: vec![outcome.clone()],
        };

        multi.on_batch_start(&files).await;
        multi.on_import_complete(&outcome).await;
        multi.on_batch_complete(&result).await;

        let expected = vec!["start:1", "file:a.xml", "done:1"];
        assert_eq!(*first.0.lock().unwrap(), expected);
        assert_eq!(*second.0.lock().unwrap(), expected);
    }
}
