use crate::config::ScanConfig;
use crate::printers::OutputFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kubescan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Scan a Kubernetes cluster against declarative compliance checks")]
#[command(long_about = "Loads declarative checks (resource selectors plus boolean expressions), evaluates them against the objects of a live cluster and reports which objects pass, fail or were skipped.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the current cluster
    Scan(ScanArgs),

    /// Run check fixture documents without a cluster
    Test(TestArgs),

    /// Print version information
    Version {
        /// Output format
        #[arg(short, long, value_enum)]
        output: Option<VersionFormat>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    /// Check documents to run in addition to the built-in checks
    #[arg(short = 'f', long = "checks", value_name = "FILE", num_args = 1..)]
    pub checks: Vec<PathBuf>,

    /// Run only the checks given with --checks
    #[arg(long, requires = "checks")]
    pub disable_builtin: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Exit successfully even when checks report errors
    #[arg(long)]
    pub no_fail: bool,

    /// Annotation listing check IDs an object opts out of
    #[arg(long, value_name = "KEY")]
    pub skip_annotation: Option<String>,

    /// Evaluate objects even when they carry the skip annotation
    #[arg(long)]
    pub disable_annotation_skip: bool,

    /// Evaluation cost ceiling per expression (0 disables it)
    #[arg(long, value_name = "COST")]
    pub cost_limit: Option<u64>,

    /// Only scan objects in this namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Timeout for each API request, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Args)]
pub struct TestArgs {
    /// Check documents; each is tested against its `<name>_test` sibling
    #[arg(value_name = "FILE", required_unless_present = "builtin")]
    pub checks: Vec<PathBuf>,

    /// Also run the fixtures of the built-in checks
    #[arg(long)]
    pub builtin: bool,

    /// Evaluation cost ceiling per expression (0 disables it)
    #[arg(long, value_name = "COST")]
    pub cost_limit: Option<u64>,
}

impl ScanArgs {
    /// Override `config` with the flags given on the command line.
    pub fn apply(&self, mut config: ScanConfig) -> ScanConfig {
        config.checks.extend(self.checks.iter().cloned());
        if self.disable_builtin {
            config.disable_builtin = true;
        }
        if self.no_fail {
            config.no_fail = true;
        }
        if let Some(annotation) = &self.skip_annotation {
            config.skip_annotation = annotation.clone();
        }
        if self.disable_annotation_skip {
            config.disable_annotation_skip = true;
        }
        if let Some(cost_limit) = self.cost_limit {
            config.cost_limit = cost_limit;
        }
        if let Some(namespace) = &self.namespace {
            config.namespace = Some(namespace.clone());
        }
        if let Some(context) = &self.context {
            config.context = Some(context.clone());
        }
        if let Some(timeout) = self.timeout {
            config.timeout_seconds = timeout;
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VersionFormat {
    Json,
    Yaml,
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
