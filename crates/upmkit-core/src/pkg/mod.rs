//! Package manager functionality.
//!
//! Provides utilities for:
//! - Parsing package requests (name@version)
//! - Fetching package metadata from a primary and an upstream registry
//! - Breadth-first dependency resolution
//! - Loading and saving the project manifest
//! - Patching dependencies and scoped registries into the manifest

pub mod add;
pub mod error;
pub mod manifest;
pub mod patch;
pub mod registry;
pub mod resolve;
pub mod spec;

#[cfg(test)]
pub(crate) mod testing;

pub use add::{add_packages, add_to_manifest, AddErrorInfo, AddOutcome, AddReport};
pub use error::{codes as pkg_codes, PkgError};
pub use manifest::{Manifest, ScopedRegistry, MANIFEST_PATH};
pub use patch::{apply_add, scope_names, AddPatch, DependencyChange, PatchOutcome};
pub use registry::{
    fetch_package_info, get_dependencies, get_latest_version, get_versions, has_version,
    PackumentSource, RegistryClient, DEFAULT_REGISTRY, DEFAULT_UPSTREAM_REGISTRY,
};
pub use resolve::{
    is_platform_module, resolve_dependencies, ResolveResult, ResolveWarning, ResolvedEntry,
    Resolver,
};
pub use spec::{PackageRequest, LATEST};
