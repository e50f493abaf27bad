use crate::checks::{BuiltinRegistry, CheckSet};
use crate::cli::ScanArgs;
use crate::config::ScanConfig;
use crate::printers::print_report;
use crate::scan::{KubeSource, Scanner};
use anyhow::{Context, Result, bail};
use std::path::Path;

/// Resolve the effective scan configuration: the optional config file
/// first, then command-line flags on top.
pub fn resolve_config(args: &ScanArgs, config_path: Option<&Path>) -> Result<ScanConfig> {
    let base = match config_path {
        Some(path) => ScanConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ScanConfig::default(),
    };
    let config = args.apply(base);

    if config.disable_builtin && config.checks.is_empty() {
        bail!("built-in checks are disabled but no check files were given");
    }
    Ok(config)
}

/// Load the checks to run for `config`.
pub fn load_checks(config: &ScanConfig) -> Result<CheckSet> {
    let builtins = if config.disable_builtin {
        BuiltinRegistry::empty()
    } else {
        BuiltinRegistry::load().context("Failed to load built-in checks")?
    };
    let checks = CheckSet::from_sources(&builtins, &config.checks)?;
    log::info!(
        "Loaded {} checks ({} built-in)",
        checks.len(),
        builtins.len()
    );
    Ok(checks)
}

/// Scan the current cluster and print the report.
///
/// Returns `true` when the process should exit with a failure status.
pub async fn handle_scan(args: ScanArgs, config_path: Option<&Path>) -> Result<bool> {
    let config = resolve_config(&args, config_path)?;
    if args.no_color {
        colored::control::set_override(false);
    }

    let checks = load_checks(&config)?;

    // Install rustls crypto provider (required for TLS connections to K8s API)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let source = KubeSource::new(config.context.as_deref())
        .await
        .context("Failed to connect to Kubernetes cluster")?;

    let no_fail = config.no_fail;
    let scanner = Scanner::new(&source, config);
    let cancel = scanner.cancel_flag();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping scan");
            cancel.cancel();
        }
    });

    let result = scanner.scan(&checks).await;
    interrupt.abort();
    let report = result?;

    print_report(&report, args.output);

    if report.has_error() {
        log::warn!("One or more checks reported errors");
    }
    Ok(report.has_error() && !no_fail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::io::Write;

    fn scan_args(args: &[&str]) -> ScanArgs {
        match Cli::try_parse_from(args).unwrap().command {
            Commands::Scan(args) => args,
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn test_resolve_config_layers_flags_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "costLimit: 10\nnamespace: staging").unwrap();

        let args = scan_args(&["kubescan", "scan", "-n", "prod"]);
        let config = resolve_config(&args, Some(file.path())).unwrap();
        assert_eq!(config.cost_limit, 10);
        assert_eq!(config.namespace.as_deref(), Some("prod"));
    }

    #[test]
    fn test_resolve_config_rejects_empty_check_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "disableBuiltin: true").unwrap();

        let args = scan_args(&["kubescan", "scan"]);
        assert!(resolve_config(&args, Some(file.path())).is_err());
    }

    #[test]
    fn test_load_checks_includes_builtins() {
        let checks = load_checks(&ScanConfig::default()).unwrap();
        assert!(checks.len() >= 8);
        assert!(checks.iter().all(|c| c.builtin));
    }

    #[test]
    fn test_load_checks_with_custom_file_only() {
        let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
        write!(
            file,
            r#"
id: CUSTOM-1
message: Deployments need two replicas
severity: low
match:
  resources:
    - group: apps
      version: v1
      resource: deployments
validations:
  - expression: object.spec.replicas >= 2
"#
        )
        .unwrap();

        let config = ScanConfig::default()
            .with_check_file(file.path())
            .without_builtin();
        let checks = load_checks(&config).unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks.iter().next().unwrap().id, "CUSTOM-1");
    }
}
