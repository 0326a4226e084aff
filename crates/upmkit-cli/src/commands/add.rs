//! `upmkit add` command implementation.

use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use upmkit_core::pkg::{add_packages, AddReport, PkgError, RegistryClient};
use upmkit_core::{paths, AddEnv};

/// Options for an add run.
#[derive(Debug, Clone)]
pub struct AddAction {
    /// Package tokens as typed, `name` or `name@version`.
    pub packages: Vec<String>,
    /// Unity project directory, relative to the working directory.
    pub chdir: Option<PathBuf>,
    pub registry: Option<String>,
    pub upstream: bool,
    pub upstream_registry: Option<String>,
}

/// Run the add command and return the process exit code.
///
/// Configuration problems (bad registry URL, missing project directory)
/// are returned as errors; manifest problems are reported and yield 1.
pub fn run(cwd: &Path, action: AddAction, json: bool) -> Result<i32> {
    let project_dir = paths::project_dir(cwd, action.chdir.as_deref()).into_diagnostic()?;
    let manifest_path = paths::manifest_path(&project_dir);

    let mut env = AddEnv::from_options(action.registry.as_deref(), action.upstream, manifest_path)
        .into_diagnostic()?;
    if let Some(upstream_registry) = &action.upstream_registry {
        env = env.with_upstream_registry(upstream_registry);
    }
    debug!(
        registry = %env.registry,
        namespace = %env.namespace,
        upstream = env.upstream,
        manifest = %env.manifest_path.display(),
        "add environment"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    let result = runtime.block_on(async {
        let primary = RegistryClient::new(&env.registry)?;
        let upstream = RegistryClient::new(&env.upstream_registry)?;
        add_packages(&action.packages, &env, &primary, &upstream).await
    });

    match result {
        Ok(report) => {
            if json {
                print_report(&report);
            }
            Ok(report.exit_code())
        }
        Err(e) => {
            if json {
                print_failure(&e);
            } else {
                error!("{}", e.message());
            }
            Ok(1)
        }
    }
}

fn print_report(report: &AddReport) {
    match serde_json::to_string_pretty(report) {
        Ok(out) => println!("{out}"),
        Err(e) => error!("failed to serialize report: {e}"),
    }
}

fn print_failure(e: &PkgError) {
    let out = serde_json::json!({
        "ok": false,
        "dirty": false,
        "packages": [],
        "error": {
            "code": e.code(),
            "message": e.message(),
        },
    });
    println!("{out:#}");
}
