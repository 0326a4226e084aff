//! Package request parsing.
//!
//! Parses package tokens like:
//! - `com.example.foo`
//! - `com.example.foo@1.0.0`
//! - `com.example.foo@latest`
//! - `com.example.foo@file:../foo`
//! - `com.example.foo@https://github.com/example/foo.git#v1`

use super::error::PkgError;
use std::fmt;

/// Version spec that means "whatever the registry tags as latest".
pub const LATEST: &str = "latest";

/// Prefixes of version specs that point outside any registry.
const NON_REGISTRY_PREFIXES: &[&str] = &["git", "file", "http"];

/// A requested package: name plus optional version spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRequest {
    /// Package name (e.g., "com.example.foo").
    pub name: String,
    /// Exact version, "latest", a non-registry source, or None (latest).
    pub version: Option<String>,
}

impl PackageRequest {
    /// Create a request from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parse a `name[@version]` token.
    ///
    /// The version spec is everything after the first `@`, so sources such
    /// as `git@host:repo.git` survive intact.
    ///
    /// # Errors
    /// Returns an error if the name is empty or invalid, or a `@` is
    /// followed by nothing.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(PkgError::spec_invalid("Empty package spec"));
        }

        let (name, version) = match input.split_once('@') {
            Some((name, version)) => {
                if version.is_empty() {
                    return Err(PkgError::spec_invalid(format!(
                        "Invalid package spec: empty version in '{input}'"
                    )));
                }
                (name, Some(version.to_string()))
            }
            None => (input, None),
        };

        Self::validate_name(name)?;

        Ok(Self {
            name: name.to_string(),
            version,
        })
    }

    fn validate_name(name: &str) -> Result<(), PkgError> {
        if name.is_empty() {
            return Err(PkgError::spec_invalid("Empty package name"));
        }

        for c in name.chars() {
            if !c.is_alphanumeric() && c != '-' && c != '_' && c != '.' {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid character '{c}' in package name '{name}'"
                )));
            }
        }

        Ok(())
    }

    /// True when no concrete version was asked for.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.version.as_deref().map_or(true, |v| v == LATEST)
    }

    /// True when the version spec is a local path, URL, or git reference.
    ///
    /// Such packages are written to the manifest verbatim and never looked
    /// up on a registry.
    #[must_use]
    pub fn is_git_or_local(&self) -> bool {
        self.version
            .as_deref()
            .is_some_and(|v| NON_REGISTRY_PREFIXES.iter().any(|p| v.starts_with(p)))
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{version}", self.name),
            None => f.write_str(&self.name),
        }
    }
}
