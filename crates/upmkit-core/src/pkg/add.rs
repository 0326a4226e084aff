//! Adding packages to a project manifest.
//!
//! Each requested package is verified against the registries, resolved,
//! and patched into the in-memory manifest. The manifest is loaded once and
//! written once at the end, only if some request changed it. A failing
//! request is reported and skipped; the others still proceed.

use super::error::PkgError;
use super::manifest::Manifest;
use super::patch::{apply_add, AddPatch, DependencyChange};
use super::registry::{
    fetch_package_info, get_latest_version, get_versions, has_version, PackumentSource,
};
use super::resolve::{ResolveWarning, ResolvedEntry, Resolver};
use super::spec::{PackageRequest, LATEST};
use crate::config::AddEnv;
use serde::Serialize;
use tracing::{debug, error, info};

/// Error details for a failed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddErrorInfo {
    pub code: String,
    pub message: String,
}

impl From<&PkgError> for AddErrorInfo {
    fn from(e: &PkgError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.message().to_string(),
        }
    }
}

/// Outcome of one requested package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddOutcome {
    /// The token as given by the user.
    pub spec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Version spec written to the manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub upstream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<DependencyChange>,
    pub scopes_added: Vec<String>,
    pub warnings: Vec<ResolveWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AddErrorInfo>,
    #[serde(skip)]
    pub dirty: bool,
}

impl AddOutcome {
    fn new(spec: &str) -> Self {
        Self {
            spec: spec.to_string(),
            name: None,
            version: None,
            upstream: false,
            change: None,
            scopes_added: Vec::new(),
            warnings: Vec::new(),
            error: None,
            dirty: false,
        }
    }

    fn failed(mut self, e: &PkgError) -> Self {
        error!("{}", e.message());
        self.error = Some(e.into());
        self
    }

    /// Whether this package was added.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated result of an add invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddReport {
    /// Every package succeeded.
    pub ok: bool,
    /// The manifest was changed.
    pub dirty: bool,
    pub packages: Vec<AddOutcome>,
}

impl AddReport {
    /// Process exit code: 0 if every package succeeded, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.ok)
    }
}

/// What to write for one package, before touching the manifest.
struct AddPlan {
    version: String,
    upstream: bool,
    resolved: Vec<ResolvedEntry>,
    warnings: Vec<ResolveWarning>,
}

/// Add `specs` to the manifest at `env.manifest_path`.
///
/// # Errors
/// Returns an error only for manifest I/O: a missing or unparseable
/// manifest aborts before any request runs, and a failed write aborts at
/// the end. Per-package failures are reported in the [`AddReport`].
pub async fn add_packages<R: PackumentSource>(
    specs: &[String],
    env: &AddEnv,
    primary: &R,
    upstream: &R,
) -> Result<AddReport, PkgError> {
    let mut manifest = Manifest::load(&env.manifest_path)?;

    let report = add_to_manifest(&mut manifest, specs, env, primary, upstream).await;

    if report.dirty {
        manifest.save(&env.manifest_path)?;
        info!("manifest updated, please open unity project to apply changes");
    }

    Ok(report)
}

/// Add `specs` to an in-memory manifest, one after another.
pub async fn add_to_manifest<R: PackumentSource>(
    manifest: &mut Manifest,
    specs: &[String],
    env: &AddEnv,
    primary: &R,
    upstream: &R,
) -> AddReport {
    let mut packages = Vec::with_capacity(specs.len());
    for spec in specs {
        packages.push(add_one(manifest, spec, env, primary, upstream).await);
    }

    AddReport {
        ok: packages.iter().all(AddOutcome::ok),
        dirty: packages.iter().any(|p| p.dirty),
        packages,
    }
}

async fn add_one<R: PackumentSource>(
    manifest: &mut Manifest,
    spec: &str,
    env: &AddEnv,
    primary: &R,
    upstream: &R,
) -> AddOutcome {
    let outcome = AddOutcome::new(spec);

    let request = match PackageRequest::parse(spec) {
        Ok(request) => request,
        Err(e) => return outcome.failed(&e),
    };

    let outcome = AddOutcome {
        name: Some(request.name.clone()),
        ..outcome
    };

    let plan = match plan_add(&request, env, primary, upstream).await {
        Ok(plan) => plan,
        Err(e) => return outcome.failed(&e),
    };

    let patched = apply_add(
        manifest,
        &AddPatch {
            name: &request.name,
            version: &plan.version,
            upstream: plan.upstream,
            resolved: &plan.resolved,
        },
        &env.registry,
        &env.namespace,
    );

    AddOutcome {
        version: Some(plan.version),
        upstream: plan.upstream,
        change: Some(patched.change),
        scopes_added: patched.scopes_added,
        warnings: plan.warnings,
        dirty: patched.dirty,
        ..outcome
    }
}

/// Verify a request and work out what it adds.
///
/// Unlike dependency resolution, an explicit version that the registry
/// does not know fails the request instead of falling back.
async fn plan_add<R: PackumentSource>(
    request: &PackageRequest,
    env: &AddEnv,
    primary: &R,
    upstream: &R,
) -> Result<AddPlan, PkgError> {
    if let Some(source) = request.version.as_deref().filter(|_| request.is_git_or_local()) {
        debug!(name = %request.name, source, "adding non-registry package");
        return Ok(AddPlan {
            version: source.to_string(),
            upstream: false,
            resolved: vec![ResolvedEntry {
                name: request.name.clone(),
                version: source.to_string(),
                upstream: false,
                is_self: true,
                module: false,
            }],
            warnings: Vec::new(),
        });
    }

    let mut use_upstream = false;
    let mut packument = fetch_package_info(primary, &request.name).await;
    if packument.is_none() && env.upstream {
        packument = fetch_package_info(upstream, &request.name).await;
        use_upstream = packument.is_some();
    }
    let Some(packument) = packument else {
        return Err(PkgError::not_found(&request.name));
    };

    let requested = if request.is_latest() {
        get_latest_version(&packument).map(String::from)
    } else {
        request.version.clone()
    };
    let version = match requested {
        Some(version) if has_version(&packument, &version) => version,
        other => {
            let choices: Vec<String> = get_versions(&packument)
                .into_iter()
                .rev()
                .map(String::from)
                .collect();
            return Err(PkgError::version_not_found(
                &request.name,
                other.as_deref().unwrap_or(LATEST),
                &choices,
            ));
        }
    };

    debug!(name = %request.name, version = %version, upstream = use_upstream, "verified package");

    if use_upstream {
        // Upstream packages are globally resolvable; only the root matters.
        return Ok(AddPlan {
            resolved: vec![ResolvedEntry {
                name: request.name.clone(),
                version: version.clone(),
                upstream: true,
                is_self: true,
                module: false,
            }],
            version,
            upstream: true,
            warnings: Vec::new(),
        });
    }

    let mut resolver = Resolver::new(primary, env.upstream.then_some(upstream));
    resolver.prime(request.name.clone(), packument, false);

    let root = PackageRequest::new(request.name.clone(), Some(version.clone()));
    let result = resolver.resolve(&root, true).await;

    debug!(
        name = %request.name,
        resolved = result.entries.len(),
        fetched = result.fetched_count,
        "resolved dependencies"
    );

    Ok(AddPlan {
        version,
        upstream: false,
        resolved: result.entries,
        warnings: result.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::error::codes;
    use crate::pkg::testing::{packument, MemoryRegistry};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const PRIMARY: &str = "https://package.openupm.com";
    const UPSTREAM: &str = "https://packages.unity.com";

    fn env(upstream: bool) -> AddEnv {
        AddEnv::from_options(None, upstream, PathBuf::from("Packages/manifest.json")).unwrap()
    }

    fn specs(specs: &[&str]) -> Vec<String> {
        specs.iter().map(|s| (*s).to_string()).collect()
    }

    fn registries() -> (MemoryRegistry, MemoryRegistry) {
        let primary = MemoryRegistry::new(PRIMARY)
            .with(
                "com.example.foo",
                packument("1.0.0", &[("1.0.0", &[])]),
            )
            .with(
                "com.example.bar",
                packument("2.0.0", &[("1.0.0", &[]), ("2.0.0", &[])]),
            )
            .with(
                "com.example.app",
                packument(
                    "1.0.0",
                    &[(
                        "1.0.0",
                        &[
                            ("com.example.lib", "1.0.0"),
                            ("com.unity.ugui", "1.0.0"),
                            ("com.unity.modules.ui", "1.0.0"),
                        ],
                    )],
                ),
            )
            .with(
                "com.example.lib",
                packument("1.0.0", &[("1.0.0", &[("com.example.util", "latest")])]),
            )
            .with(
                "com.example.util",
                packument("3.0.0", &[("3.0.0", &[])]),
            );
        let upstream = MemoryRegistry::new(UPSTREAM)
            .with("com.unity.ugui", packument("1.0.0", &[("1.0.0", &[])]))
            .with(
                "com.unity.textmeshpro",
                packument("3.0.6", &[("3.0.6", &[])]),
            );
        (primary, upstream)
    }

    #[tokio::test]
    async fn test_add_single_package() {
        let (primary, upstream) = registries();
        let mut manifest = Manifest::from_json(r#"{"dependencies": {}}"#).unwrap();

        let report = add_to_manifest(
            &mut manifest,
            &specs(&["com.example.foo@1.0.0"]),
            &env(true),
            &primary,
            &upstream,
        )
        .await;

        assert!(report.ok);
        assert!(report.dirty);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(manifest.dependency("com.example.foo"), Some("1.0.0"));
        assert_eq!(
            manifest.scoped_registry(PRIMARY).unwrap().scopes,
            vec!["com.example.foo".to_string(), "com.openupm".to_string()]
        );

        let outcome = &report.packages[0];
        assert_eq!(outcome.change, Some(DependencyChange::Added));
        assert_eq!(outcome.version.as_deref(), Some("1.0.0"));
        assert!(!outcome.upstream);
        // the verified packument is reused by the resolver
        assert_eq!(primary.requests(), vec!["com.example.foo".to_string()]);
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_version_fails_without_touching_manifest() {
        let (primary, upstream) = registries();
        let mut manifest = Manifest::from_json(r#"{"dependencies": {}}"#).unwrap();
        let before = manifest.clone();

        let report = add_to_manifest(
            &mut manifest,
            &specs(&["com.example.bar@9.9.9"]),
            &env(true),
            &primary,
            &upstream,
        )
        .await;

        assert!(!report.ok);
        assert!(!report.dirty);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(manifest, before);

        let error = report.packages[0].error.as_ref().unwrap();
        assert_eq!(error.code, codes::PKG_VERSION_NOT_FOUND);
        assert!(error.message.ends_with("2.0.0, 1.0.0"), "{}", error.message);
    }

    #[tokio::test]
    async fn test_latest_resolves_to_dist_tag() {
        let (primary, upstream) = registries();
        let mut manifest = Manifest::default();

        let report = add_to_manifest(
            &mut manifest,
            &specs(&["com.example.bar", "com.example.foo@latest"]),
            &env(true),
            &primary,
            &upstream,
        )
        .await;

        assert!(report.ok);
        assert_eq!(manifest.dependency("com.example.bar"), Some("2.0.0"));
        assert_eq!(manifest.dependency("com.example.foo"), Some("1.0.0"));
    }

    #[tokio::test]
    async fn test_unknown_package_fails() {
        let (primary, upstream) = registries();
        let mut manifest = Manifest::default();

        let report = add_to_manifest(
            &mut manifest,
            &specs(&["com.example.missing"]),
            &env(true),
            &primary,
            &upstream,
        )
        .await;

        assert!(!report.ok);
        assert_eq!(
            report.packages[0].error.as_ref().unwrap().code,
            codes::PKG_NOT_FOUND
        );
        assert_eq!(manifest, Manifest::default());
        assert_eq!(upstream.requests(), vec!["com.example.missing".to_string()]);
    }

    #[tokio::test]
    async fn test_upstream_root_skips_scopes() {
        let (primary, upstream) = registries();
        let mut manifest = Manifest::from_json(r#"{"dependencies": {}}"#).unwrap();

        let report = add_to_manifest(
            &mut manifest,
            &specs(&["com.unity.textmeshpro"]),
            &env(true),
            &primary,
            &upstream,
        )
        .await;

        assert!(report.ok);
        assert!(report.packages[0].upstream);
        assert_eq!(manifest.dependency("com.unity.textmeshpro"), Some("3.0.6"));
        assert!(manifest.get("scopedRegistries").is_none());
    }

    #[tokio::test]
    async fn test_upstream_disabled() {
        let (primary, upstream) = registries();
        let mut manifest = Manifest::default();

        let report = add_to_manifest(
            &mut manifest,
            &specs(&["com.unity.textmeshpro"]),
            &env(false),
            &primary,
            &upstream,
        )
        .await;

        assert!(!report.ok);
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_deep_dependencies_scoped() {
        let (primary, upstream) = registries();
        let mut manifest = Manifest::default();

        let report = add_to_manifest(
            &mut manifest,
            &specs(&["com.example.app@1.0.0"]),
            &env(true),
            &primary,
            &upstream,
        )
        .await;

        assert!(report.ok);
        assert!(report.packages[0].warnings.is_empty());
        assert_eq!(manifest.dependency("com.example.app"), Some("1.0.0"));
        assert_eq!(manifest.dependency("com.example.lib"), None);
        assert_eq!(
            manifest.scoped_registry(PRIMARY).unwrap().scopes,
            vec![
                "com.example.app".to_string(),
                "com.example.lib".to_string(),
                "com.example.util".to_string(),
                "com.openupm".to_string(),
            ]
        );
        assert!(!upstream
            .requests()
            .contains(&"com.unity.modules.ui".to_string()));
    }

    #[tokio::test]
    async fn test_git_source_written_verbatim() {
        let (primary, upstream) = registries();
        let mut manifest = Manifest::default();

        let report = add_to_manifest(
            &mut manifest,
            &specs(&["com.example.local@file:../local"]),
            &env(true),
            &primary,
            &upstream,
        )
        .await;

        assert!(report.ok);
        assert_eq!(manifest.dependency("com.example.local"), Some("file:../local"));
        assert_eq!(
            manifest.scoped_registry(PRIMARY).unwrap().scopes,
            vec!["com.example.local".to_string(), "com.openupm".to_string()]
        );
        assert!(primary.requests().is_empty());
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_later_packages() {
        let (primary, upstream) = registries();
        let mut manifest = Manifest::default();

        let report = add_to_manifest(
            &mut manifest,
            &specs(&["com/invalid", "com.example.bar@9.9.9", "com.example.foo"]),
            &env(true),
            &primary,
            &upstream,
        )
        .await;

        assert!(!report.ok);
        assert!(report.dirty);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(
            report.packages[0].error.as_ref().unwrap().code,
            codes::PKG_SPEC_INVALID
        );
        assert!(report.packages[2].ok());
        assert_eq!(manifest.dependency("com.example.foo"), Some("1.0.0"));
        assert_eq!(manifest.dependency("com.example.bar"), None);
    }

    #[tokio::test]
    async fn test_second_add_is_clean() {
        let (primary, upstream) = registries();
        let mut manifest = Manifest::default();
        let request = specs(&["com.example.app@1.0.0"]);

        let first = add_to_manifest(&mut manifest, &request, &env(true), &primary, &upstream).await;
        let second = add_to_manifest(&mut manifest, &request, &env(true), &primary, &upstream).await;

        assert!(first.dirty);
        assert!(second.ok);
        assert!(!second.dirty);
        assert_eq!(
            second.packages[0].change,
            Some(DependencyChange::Unchanged)
        );
    }

    #[tokio::test]
    async fn test_add_packages_writes_once() {
        let (primary, upstream) = registries();
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(&path, r#"{"dependencies":{},"testables":["com.example.tests"]}"#).unwrap();
        let env = AddEnv {
            manifest_path: path.clone(),
            ..env(true)
        };

        let report = add_packages(
            &specs(&["com.example.foo", "com.example.bar@1.0.0"]),
            &env,
            &primary,
            &upstream,
        )
        .await
        .unwrap();

        assert!(report.ok);
        let saved = Manifest::load(&path).unwrap();
        assert_eq!(saved.dependency("com.example.foo"), Some("1.0.0"));
        assert_eq!(saved.dependency("com.example.bar"), Some("1.0.0"));
        assert!(saved.get("testables").is_some());
        assert!(fs::read_to_string(&path).unwrap().contains("\n  \"dependencies\""));
    }

    #[tokio::test]
    async fn test_add_packages_clean_run_leaves_file_alone() {
        let (primary, upstream) = registries();
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        // compact formatting would be rewritten by any save
        let original = r#"{"dependencies":{"com.example.foo":"1.0.0"},"scopedRegistries":[{"name":"package.openupm.com","url":"https://package.openupm.com","scopes":["com.example.foo","com.openupm"]}]}"#;
        fs::write(&path, original).unwrap();
        let env = AddEnv {
            manifest_path: path.clone(),
            ..env(true)
        };

        let report = add_packages(&specs(&["com.example.foo"]), &env, &primary, &upstream)
            .await
            .unwrap();

        assert!(report.ok);
        assert!(!report.dirty);
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[tokio::test]
    async fn test_add_packages_keeps_key_order() {
        let (primary, upstream) = registries();
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(
            &path,
            r#"{"testables":["com.example.tests"],"scopedRegistries":[{"url":"https://package.openupm.com","name":"openupm","scopes":["com.openupm"]}],"dependencies":{}}"#,
        )
        .unwrap();
        let env = AddEnv {
            manifest_path: path.clone(),
            ..env(true)
        };

        let report = add_packages(&specs(&["com.example.foo"]), &env, &primary, &upstream)
            .await
            .unwrap();
        assert!(report.dirty);

        let saved = fs::read_to_string(&path).unwrap();
        let pos = |key: &str| saved.find(&format!("\"{key}\"")).unwrap();
        assert!(pos("testables") < pos("scopedRegistries"), "{saved}");
        assert!(pos("scopedRegistries") < pos("dependencies"), "{saved}");
        assert!(pos("url") < pos("name"), "{saved}");
    }

    #[tokio::test]
    async fn test_add_packages_missing_manifest() {
        let (primary, upstream) = registries();
        let dir = tempdir().unwrap();
        let env = AddEnv {
            manifest_path: dir.path().join("manifest.json"),
            ..env(true)
        };

        let err = add_packages(&specs(&["com.example.foo"]), &env, &primary, &upstream)
            .await
            .unwrap_err();

        assert_eq!(err.code(), codes::MANIFEST_NOT_FOUND);
        assert!(primary.requests().is_empty());
    }

    #[test]
    fn test_report_serialization() {
        let report = AddReport {
            ok: true,
            dirty: true,
            packages: vec![AddOutcome {
                name: Some("com.example.foo".to_string()),
                version: Some("1.0.0".to_string()),
                change: Some(DependencyChange::Added),
                dirty: true,
                ..AddOutcome::new("com.example.foo@1.0.0")
            }],
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["packages"][0]["change"]["status"], "added");
        assert!(json["packages"][0].get("error").is_none());
        assert!(json["packages"][0].get("dirty").is_none());
    }
}
