//! # kubescan
//!
//! A command-line scanner that evaluates a Kubernetes cluster against
//! declarative compliance checks.
//!
//! A check selects resource types and asserts boolean expressions over
//! each object of those types. Expressions are written in a small CEL
//! dialect, type-checked when the check is compiled and evaluated under a
//! cost ceiling.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kubescan::checks::{BuiltinRegistry, CheckSet};
//! use kubescan::config::ScanConfig;
//! use kubescan::scan::{KubeSource, Scanner};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let checks = BuiltinRegistry::load()?.check_set();
//! let source = KubeSource::new(None).await?;
//! let report = Scanner::new(&source, ScanConfig::default()).scan(&checks).await?;
//! println!("{} checks failed", report.checks.iter().filter(|c| c.total_failed > 0).count());
//! # Ok(())
//! # }
//! ```

pub mod checks;
pub mod cli;
pub mod config;
pub mod expr;
pub mod handlers;
pub mod printers;
pub mod report;
pub mod scan;
pub mod validator;
pub mod version;

// Re-export commonly used types and functions
pub use checks::{BuiltinRegistry, Check, CheckSet};
pub use handlers::{handle_scan, handle_test, handle_version};
pub use report::{CheckResult, Report};
pub use scan::Scanner;
pub use validator::{CompiledCheck, compile};

use cli::Commands;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Execute a parsed command. Returns `true` when the process should exit
/// with a failure status.
pub async fn run_command(command: Commands, config_path: Option<&std::path::Path>) -> anyhow::Result<bool> {
    match command {
        Commands::Scan(args) => handlers::handle_scan(args, config_path).await,
        Commands::Test(args) => handlers::handle_test(args, config_path),
        Commands::Version { output } => {
            handlers::handle_version(output)?;
            Ok(false)
        }
    }
}
