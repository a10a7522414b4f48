//! xray-import CLI - Import test results into Xray.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use xray_import::config::{self, Config};
use xray_import::discovery::{ImportFile, discover_files};
use xray_import::importer::{Importer, XrayCloud, XrayServer};
use xray_import::orchestrator::Orchestrator;
use xray_import::report::{ConsoleReporter, GithubOutputReporter, MultiReporter, SummaryReporter};

#[derive(Parser)]
#[command(name = "xray-import")]
#[command(about = "Import test results into Xray", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "xray-import.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import result files into Xray
    Import {
        /// Override maximum parallel imports
        #[arg(short, long)]
        parallel: Option<usize>,

        /// Override the path patterns (newline-separated globs)
        #[arg(long)]
        paths: Option<String>,

        /// Import into an existing test execution
        #[arg(long)]
        test_exec_key: Option<String>,

        /// Write a JSON summary to this path
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Append step outputs to this file (defaults to $GITHUB_OUTPUT)
        #[arg(long)]
        github_output: Option<PathBuf>,
    },

    /// List the files that would be imported
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate configuration file
    Validate,

    /// Initialize a new configuration file
    Init {
        /// Generate a configuration for Xray Server / Data Center
        #[arg(long)]
        server: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Import {
            parallel,
            paths,
            test_exec_key,
            summary,
            github_output,
        } => {
            let overrides = ImportOverrides {
                parallel,
                paths,
                test_exec_key,
            };
            let code =
                run_import(&cli.config, overrides, summary, github_output, cli.verbose).await?;
            std::process::exit(code);
        }
        Commands::List { format } => list_files(&cli.config, &format),
        Commands::Validate => validate_config(&cli.config),
        Commands::Init { server } => init_config(&cli.config, server),
    }
}

struct ImportOverrides {
    parallel: Option<usize>,
    paths: Option<String>,
    test_exec_key: Option<String>,
}

fn load_validated(config_path: &Path) -> Result<Config> {
    let config = config::load_config(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.validate()?;
    Ok(config)
}

async fn run_import(
    config_path: &Path,
    overrides: ImportOverrides,
    summary_path: Option<PathBuf>,
    github_output: Option<PathBuf>,
    verbose: bool,
) -> Result<i32> {
    let mut config = config::load_config(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Apply overrides
    if let Some(parallel) = overrides.parallel {
        config.options.import_parallelism = parallel;
    }
    if let Some(paths) = overrides.paths {
        config.import.paths = paths;
    }
    if let Some(key) = overrides.test_exec_key {
        config.import.test_exec_key = Some(key);
    }
    config.validate()?;

    info!("Loaded configuration from {}", config_path.display());
    info!("Importing from: {}", config.import.paths);
    info!("Importing using format: {}", config.import.format);

    let files = discover_files(&config.import.paths)?;
    let reporter = create_reporter(summary_path, github_output, verbose);

    // The importer variant is fixed here, once.
    if config.xray.cloud {
        let importer = XrayCloud::new(&config.xray, config.import.clone())?;
        info!("Configured Xray Cloud");
        Ok(run_with(&config, importer, reporter, files).await)
    } else {
        let importer = XrayServer::new(&config.xray, config.import.clone())?;
        info!("Configured Xray Server");
        Ok(run_with(&config, importer, reporter, files).await)
    }
}

async fn run_with<I>(
    config: &Config,
    importer: I,
    reporter: MultiReporter,
    files: Vec<ImportFile>,
) -> i32
where
    I: Importer,
{
    let mut orchestrator = Orchestrator::new(
        config.options.clone(),
        config.import.preset_test_exec_key(),
        importer,
        reporter,
    );

    let result = orchestrator.run(files).await;
    result.exit_code()
}

fn list_files(config_path: &Path, format: &str) -> Result<()> {
    let config = load_validated(config_path)?;
    let files = discover_files(&config.import.paths)?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&files)?;
            println!("{}", json);
        }
        _ => {
            println!("Found {} files:", files.len());
            for file in &files {
                println!("  {} ({})", file.path.display(), file.content_type);
            }
        }
    }

    Ok(())
}

fn validate_config(config_path: &Path) -> Result<()> {
    match load_validated(config_path) {
        Ok(config) => {
            println!("Configuration is valid!");
            println!();
            println!("Settings:");
            println!(
                "  Variant: {}",
                if config.xray.cloud { "cloud" } else { "server" }
            );
            if let Some(url) = &config.xray.base_url {
                println!("  Base URL: {}", url);
            }
            println!("  Format: {}", config.import.format);
            println!("  Paths: {}", config.import.paths.trim());
            if let Some(key) = config.import.preset_test_exec_key() {
                println!("  Test execution: {}", key);
            }
            println!(
                "  Combine in single test execution: {}",
                config.options.combine_in_single_test_exec
            );
            println!(
                "  Fail on import error: {}",
                config.options.fail_on_import_error
            );
            println!(
                "  Continue on import error: {}",
                config.options.continue_on_import_error
            );
            println!(
                "  Import parallelism: {}",
                config.options.import_parallelism
            );

            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_config(path: &Path, server: bool) -> Result<()> {
    let xray_config = if server {
        r#"[xray]
cloud = false
base_url = "https://jira.example.com"
# Leave username empty to authenticate with a personal access token
username = "${JIRA_USERNAME}"
password = "${JIRA_PASSWORD}""#
    } else {
        r#"[xray]
cloud = true
username = "${XRAY_CLIENT_ID}"
password = "${XRAY_CLIENT_SECRET}""#
    };

    let config = format!(
        r#"# xray-import configuration file

{}
timeout_secs = 60

[import]
format = "junit"
paths = "test-results/**/*.xml"
project_key = "PROJ"

[options]
combine_in_single_test_exec = true
fail_on_import_error = true
continue_on_import_error = true
import_parallelism = 2
"#,
        xray_config
    );

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit manually.",
            path.display()
        );
        std::process::exit(1);
    }

    std::fs::write(path, config)?;
    println!("Created {}", path.display());
    println!();
    println!("Edit the configuration as needed, then run:");
    println!("  xray-import import");

    Ok(())
}

fn create_reporter(
    summary_path: Option<PathBuf>,
    github_output: Option<PathBuf>,
    verbose: bool,
) -> MultiReporter {
    let mut multi = MultiReporter::new();

    // Add console reporter
    multi = multi.with_reporter(ConsoleReporter::new(verbose));

    if let Some(path) = summary_path {
        multi = multi.with_reporter(SummaryReporter::new(path));
    }

    let github = github_output
        .map(GithubOutputReporter::new)
        .or_else(GithubOutputReporter::from_env);
    if let Some(github) = github {
        multi = multi.with_reporter(github);
    }

    multi
}
