//! Dependency resolution.
//!
//! Expands a root package request breadth-first over the registry graph.
//! Each package name is looked up on the primary registry and, when that
//! fails and an upstream registry is configured, on the upstream registry.
//! Lookups happen one at a time in queue order.
//!
//! Resolution is tolerant: a dependency that cannot be found, or whose
//! requested version does not exist, produces a [`ResolveWarning`] and the
//! traversal carries on.

use super::registry::{
    fetch_package_info, get_dependencies, get_latest_version, get_versions, has_version,
    PackumentSource,
};
use super::spec::{PackageRequest, LATEST};
use regex_lite::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, trace, warn};

/// A package that the traversal reached and pinned to a concrete version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntry {
    pub name: String,
    /// Concrete version. Platform modules keep their requested spec.
    pub version: String,
    /// Resolved through the upstream registry.
    pub upstream: bool,
    /// Same name as the root request.
    pub is_self: bool,
    /// Built-in platform module, never looked up.
    pub module: bool,
}

/// A non-fatal problem met while resolving one dependency node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolveWarning {
    /// Neither registry knows the package; the node was dropped.
    NotFound { name: String },
    /// The requested version does not exist; latest was used instead.
    VersionFallback {
        name: String,
        requested: String,
        /// Known versions, newest first.
        available: Vec<String>,
        fallback: String,
    },
    /// No usable latest version to fall back to; the node was dropped.
    NoLatestVersion { name: String },
}

impl fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name } => write!(f, "package not found: {name}"),
            Self::VersionFallback {
                name,
                requested,
                available,
                fallback,
            } => write!(
                f,
                "package {name}@{requested} is not a valid choice of {}, fall back to {name}@{fallback}",
                available.join(", ")
            ),
            Self::NoLatestVersion { name } => {
                write!(f, "package {name} has no latest version to fall back to")
            }
        }
    }
}

/// Result of resolving a root request.
#[derive(Debug, Clone, Default)]
pub struct ResolveResult {
    /// Resolved entries in breadth-first discovery order, root first.
    pub entries: Vec<ResolvedEntry>,
    /// Soft failures, in the order they happened.
    pub warnings: Vec<ResolveWarning>,
    /// Number of registry round-trips made.
    pub fetched_count: usize,
}

/// Check whether a name belongs to a built-in platform module.
#[must_use]
pub fn is_platform_module(name: &str) -> bool {
    static MODULE_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    MODULE_PATTERN
        .get_or_init(|| Regex::new(r"(?i)com.unity.modules").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

/// Packument cached together with the registry it came from.
struct CachedPackument {
    packument: Value,
    upstream: bool,
}

/// Breadth-first resolver with a per-call packument cache.
pub struct Resolver<'a, R> {
    primary: &'a R,
    upstream: Option<&'a R>,
    cache: HashMap<String, CachedPackument>,
    fetched_count: usize,
}

impl<'a, R: PackumentSource> Resolver<'a, R> {
    /// Create a resolver. `upstream` is `None` when fallback is disabled.
    #[must_use]
    pub fn new(primary: &'a R, upstream: Option<&'a R>) -> Self {
        Self {
            primary,
            upstream,
            cache: HashMap::new(),
            fetched_count: 0,
        }
    }

    /// Seed the cache with a packument the caller already fetched.
    pub fn prime(&mut self, name: impl Into<String>, packument: Value, upstream: bool) {
        self.cache.insert(
            name.into(),
            CachedPackument {
                packument,
                upstream,
            },
        );
    }

    /// Resolve `root` and, when `deep` is set, the whole dependency graph.
    ///
    /// Without `deep` only the root's direct dependencies are expanded.
    /// A request identical in name and version spec to one already
    /// processed is skipped, which also breaks dependency cycles.
    pub async fn resolve(mut self, root: &PackageRequest, deep: bool) -> ResolveResult {
        let mut pending: VecDeque<PackageRequest> = VecDeque::from([root.clone()]);
        let mut processed: HashSet<PackageRequest> = HashSet::new();
        let mut entries = Vec::new();
        let mut warnings = Vec::new();

        while let Some(request) = pending.pop_front() {
            if processed.contains(&request) {
                trace!(request = %request, "already processed");
                continue;
            }
            processed.insert(request.clone());

            let is_self = request.name == root.name;

            if is_platform_module(&request.name) {
                let version = request.version.unwrap_or_else(|| LATEST.to_string());
                debug!("- {}@{version}", request.name);
                entries.push(ResolvedEntry {
                    name: request.name,
                    version,
                    upstream: false,
                    is_self,
                    module: true,
                });
                continue;
            }

            let Some(cached) = self.lookup(&request.name).await else {
                warn!("package not found: {}", request.name);
                warnings.push(ResolveWarning::NotFound { name: request.name });
                continue;
            };
            let upstream = cached.upstream;
            let packument = &cached.packument;

            let latest = get_latest_version(packument);
            let requested = if request.is_latest() {
                latest
            } else {
                request.version.as_deref()
            };

            let version = match requested {
                Some(v) if has_version(packument, v) => v.to_string(),
                _ => match latest.filter(|l| has_version(packument, l)) {
                    Some(fallback) => {
                        let warning = ResolveWarning::VersionFallback {
                            name: request.name.clone(),
                            requested: requested.unwrap_or(LATEST).to_string(),
                            available: get_versions(packument)
                                .into_iter()
                                .rev()
                                .map(String::from)
                                .collect(),
                            fallback: fallback.to_string(),
                        };
                        warn!("{warning}");
                        warnings.push(warning);
                        fallback.to_string()
                    }
                    None => {
                        let warning = ResolveWarning::NoLatestVersion {
                            name: request.name.clone(),
                        };
                        warn!("{warning}");
                        warnings.push(warning);
                        continue;
                    }
                },
            };

            if is_self || deep {
                pending.extend(
                    get_dependencies(packument, &version)
                        .into_iter()
                        .map(|(name, spec)| PackageRequest::new(name, Some(spec))),
                );
            }

            debug!("- {}@{version}", request.name);
            entries.push(ResolvedEntry {
                name: request.name,
                version,
                upstream,
                is_self,
                module: false,
            });
        }

        ResolveResult {
            entries,
            warnings,
            fetched_count: self.fetched_count,
        }
    }

    /// Look a package up in the cache, then on the registries.
    ///
    /// Only successful lookups are cached.
    async fn lookup(&mut self, name: &str) -> Option<&CachedPackument> {
        if !self.cache.contains_key(name) {
            let found = self.fetch(name).await?;
            self.cache.insert(name.to_string(), found);
        }
        self.cache.get(name)
    }

    async fn fetch(&mut self, name: &str) -> Option<CachedPackument> {
        self.fetched_count += 1;
        if let Some(packument) = fetch_package_info(self.primary, name).await {
            return Some(CachedPackument {
                packument,
                upstream: false,
            });
        }

        let upstream = self.upstream?;
        self.fetched_count += 1;
        fetch_package_info(upstream, name)
            .await
            .map(|packument| CachedPackument {
                packument,
                upstream: true,
            })
    }
}

/// Resolve `root` with a fresh resolver.
pub async fn resolve_dependencies<R: PackumentSource>(
    root: &PackageRequest,
    primary: &R,
    upstream: Option<&R>,
    deep: bool,
) -> ResolveResult {
    Resolver::new(primary, upstream).resolve(root, deep).await
}
