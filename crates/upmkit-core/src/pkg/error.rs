//! Package manager error types.

use std::fmt;
use std::path::Path;

/// Package manager error codes.
pub mod codes {
    pub const PKG_SPEC_INVALID: &str = "PKG_SPEC_INVALID";
    pub const PKG_NOT_FOUND: &str = "PKG_NOT_FOUND";
    pub const PKG_VERSION_NOT_FOUND: &str = "PKG_VERSION_NOT_FOUND";
    pub const PKG_REGISTRY_UNREACHABLE: &str = "PKG_REGISTRY_UNREACHABLE";
    pub const PKG_REGISTRY_ERROR: &str = "PKG_REGISTRY_ERROR";

    // Manifest I/O is fatal for the whole invocation.
    pub const MANIFEST_NOT_FOUND: &str = "MANIFEST_NOT_FOUND";
    pub const MANIFEST_INVALID: &str = "MANIFEST_INVALID";
    pub const MANIFEST_WRITE_FAILED: &str = "MANIFEST_WRITE_FAILED";
}

/// Package manager error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgError {
    code: &'static str,
    message: String,
}

impl PkgError {
    /// Create a new error with the given code and message.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Create a spec invalid error.
    pub fn spec_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_SPEC_INVALID, msg)
    }

    /// Create a package not found error.
    #[must_use]
    pub fn not_found(name: &str) -> Self {
        Self::new(codes::PKG_NOT_FOUND, format!("package not found: {name}"))
    }

    /// Create an invalid version choice error.
    ///
    /// `choices` is listed as given; callers pass them newest first.
    #[must_use]
    pub fn version_not_found(name: &str, version: &str, choices: &[String]) -> Self {
        Self::new(
            codes::PKG_VERSION_NOT_FOUND,
            format!(
                "version {version} of {name} is not a valid choice of: {}",
                choices.join(", ")
            ),
        )
    }

    /// Create a registry unreachable error.
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_REGISTRY_UNREACHABLE, msg)
    }

    /// Create a registry error.
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_REGISTRY_ERROR, msg)
    }

    /// Create a manifest not found error.
    #[must_use]
    pub fn manifest_not_found(path: &Path) -> Self {
        Self::new(
            codes::MANIFEST_NOT_FOUND,
            format!("manifest does not exist: {}", path.display()),
        )
    }

    /// Create a manifest parse error.
    pub fn manifest_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::MANIFEST_INVALID, msg)
    }

    /// Create a manifest write error.
    pub fn manifest_write_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::MANIFEST_WRITE_FAILED, msg)
    }

    /// True when a registry answered that the package does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code == codes::PKG_NOT_FOUND
    }

    /// True when the registry could not be reached at all.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        self.code == codes::PKG_REGISTRY_UNREACHABLE
    }

    /// True for manifest I/O failures.
    #[must_use]
    pub fn is_manifest_error(&self) -> bool {
        matches!(
            self.code,
            codes::MANIFEST_NOT_FOUND | codes::MANIFEST_INVALID | codes::MANIFEST_WRITE_FAILED
        )
    }
}

impl fmt::Display for PkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PkgError {}

impl From<reqwest::Error> for PkgError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::unreachable(format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::unreachable(format!("Connection failed: {e}"))
        } else {
            Self::registry(e.to_string())
        }
    }
}

impl From<serde_json::Error> for PkgError {
    fn from(e: serde_json::Error) -> Self {
        Self::registry(format!("Invalid JSON: {e}"))
    }
}
