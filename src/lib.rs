//! xray-import: batch import of test results into Xray.
//!
//! This crate imports a batch of test result files (JUnit, Cucumber, TestNG,
//! ...) into Xray Cloud or Xray Server, with bounded parallelism and an
//! explicit policy for partial failures.
//!
//! # Architecture
//!
//! The main components are:
//!
//! - **Discovery**: Resolve path patterns into result files ([`discovery`])
//! - **Importers**: Talk to the Xray import API ([`importer`])
//! - **Orchestrator**: Seed import, bounded fan-out, result aggregation ([`orchestrator`])
//! - **Report**: Progress, summaries and step outputs ([`report`])
//!
//! # Example
//!
//! ```no_run
//! use xray_import::config::load_config;
//! use xray_import::discovery::discover_files;
//! use xray_import::importer::XrayServer;
//! use xray_import::orchestrator::Orchestrator;
//! use xray_import::report::NullReporter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config(std::path::Path::new("xray-import.toml"))?;
//!     let files = discover_files(&config.import.paths)?;
//!     let importer = XrayServer::new(&config.xray, config.import.clone())?;
//!
//!     let mut orchestrator = Orchestrator::new(
//!         config.options.clone(),
//!         config.import.preset_test_exec_key(),
//!         importer,
//!         NullReporter,
//!     );
//!     let result = orchestrator.run(files).await;
//!     println!("{} of {} imported", result.completed, result.total);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod importer;
pub mod orchestrator;
pub mod report;

// Re-export commonly used types
pub use config::{Config, load_config};
pub use discovery::{ImportFile, discover_files};
pub use importer::{ImportError, Importer};
pub use orchestrator::{AbortReason, BatchResult, ImportOutcome, Orchestrator};
pub use report::Reporter;
