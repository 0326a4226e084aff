//! Applying an add to the manifest.
//!
//! Records the root package under `dependencies` and, for packages that
//! come from the primary registry, makes sure every resolved package name
//! is routed to that registry through its `scopedRegistries` entry.

use super::manifest::{entry_scopes, set_entry_scopes, Manifest};
use super::resolve::ResolvedEntry;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::info;
use url::Url;

/// What happened to the root's `dependencies` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DependencyChange {
    /// No previous entry.
    Added,
    /// Previous entry had a different version spec.
    Modified { from: String },
    /// Previous entry already matched.
    Unchanged,
}

/// One package add to apply.
#[derive(Debug, Clone, Copy)]
pub struct AddPatch<'a> {
    pub name: &'a str,
    /// Value written under `dependencies[name]`.
    pub version: &'a str,
    /// The root came from the upstream registry; scopes stay untouched.
    pub upstream: bool,
    /// Entries whose names belong in the registry scope.
    pub resolved: &'a [ResolvedEntry],
}

/// Result of [`apply_add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub change: DependencyChange,
    /// Scopes that were not present before, sorted.
    pub scopes_added: Vec<String>,
    /// Whether the manifest changed at all.
    pub dirty: bool,
}

/// Names that should be scoped to the primary registry.
///
/// Upstream packages and platform modules are excluded.
#[must_use]
pub fn scope_names(resolved: &[ResolvedEntry]) -> Vec<&str> {
    resolved
        .iter()
        .filter(|entry| !entry.upstream && !entry.module)
        .map(|entry| entry.name.as_str())
        .collect()
}

/// Apply `patch` to `manifest`.
///
/// `registry` is the primary registry URL and `namespace` a scope always
/// added alongside the package names. When a scope is missing, the entry's
/// scopes are rewritten as a sorted set; when nothing is missing the
/// stored list is left exactly as it was.
pub fn apply_add(
    manifest: &mut Manifest,
    patch: &AddPatch<'_>,
    registry: &str,
    namespace: &str,
) -> PatchOutcome {
    let mut dirty = false;

    let change = match manifest.set_dependency(patch.name, patch.version) {
        None => {
            info!("added: {}@{}", patch.name, patch.version);
            dirty = true;
            DependencyChange::Added
        }
        Some(Value::String(old)) if old == patch.version => {
            info!("added: {}@{}", patch.name, patch.version);
            DependencyChange::Unchanged
        }
        Some(old) => {
            let from = match old {
                Value::String(s) => s,
                other => other.to_string(),
            };
            info!("modified: {} {from} => {}", patch.name, patch.version);
            dirty = true;
            DependencyChange::Modified { from }
        }
    };

    let mut scopes_added = Vec::new();

    if !patch.upstream {
        let (entry, created) =
            manifest.scoped_registry_entry(registry, &registry_hostname(registry));
        dirty |= created;

        let mut scopes: BTreeSet<String> = entry_scopes(entry).into_iter().collect();
        for name in scope_names(patch.resolved)
            .into_iter()
            .chain(std::iter::once(namespace))
        {
            if scopes.insert(name.to_string()) {
                scopes_added.push(name.to_string());
            }
        }

        if !scopes_added.is_empty() {
            set_entry_scopes(entry, scopes.into_iter().collect());
            dirty = true;
        }

        scopes_added.sort();
    }

    PatchOutcome {
        change,
        scopes_added,
        dirty,
    }
}

/// Hostname used as the display name of a new scoped registry entry.
fn registry_hostname(registry: &str) -> String {
    Url::parse(registry)
        .ok()
        .and_then(|url| url.host_str().map(String::from))
        .unwrap_or_else(|| registry.to_string())
}
