//! Package registry client.
//!
//! A registry serves one JSON document (packument) per package at
//! `{registry}/{name}`:
//!
//! ```json
//! {
//!   "name": "com.example.foo",
//!   "dist-tags": { "latest": "2.0.0" },
//!   "versions": {
//!     "1.0.0": { "dependencies": { "com.example.bar": "1.0.0" } },
//!     "2.0.0": { "dependencies": {} }
//!   }
//! }
//! ```

use super::error::PkgError;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, trace};
use url::Url;

/// Default primary registry URL.
pub const DEFAULT_REGISTRY: &str = "https://package.openupm.com";

/// Default upstream registry URL.
pub const DEFAULT_UPSTREAM_REGISTRY: &str = "https://packages.unity.com";

/// A source of packuments, one lookup per call.
///
/// Implemented by [`RegistryClient`] over HTTP; tests provide in-memory
/// sources. A missing package must surface as an error whose
/// [`PkgError::is_not_found`] is true, an unreachable registry as
/// [`PkgError::is_unreachable`].
#[allow(async_fn_in_trait)]
pub trait PackumentSource {
    /// Registry URL, used for logging.
    fn url(&self) -> &str;

    /// Fetch the packument for `name`. One attempt, no retries.
    async fn fetch_packument(&self, name: &str) -> Result<Value, PkgError>;
}

/// Registry client for fetching package metadata.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    url: String,
    base_url: Url,
    http: Client,
}

impl RegistryClient {
    /// Create a new registry client with the given base URL.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(registry: &str) -> Result<Self, PkgError> {
        let url = registry.trim_end_matches('/').to_string();

        // Url::join replaces the last path segment unless the base ends in '/'
        let base_url = Url::parse(&format!("{url}/"))
            .map_err(|e| PkgError::registry(format!("Invalid registry URL '{registry}': {e}")))?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("upmkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PkgError::registry(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            url,
            base_url,
            http,
        })
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the packument for `name`: `{registry}/{name}`.
    ///
    /// The name is appended as a single percent-encoded path segment, so
    /// it can never leave the registry's host or path prefix.
    ///
    /// # Errors
    /// Returns an error for an empty, `.` or `..` name, or a registry URL
    /// that cannot take path segments.
    pub fn packument_url(&self, name: &str) -> Result<Url, PkgError> {
        if matches!(name, "" | "." | "..") {
            return Err(PkgError::registry(format!("Invalid package name '{name}'")));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                PkgError::registry(format!("Registry URL '{}' cannot be a base", self.url))
            })?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }
}

impl PackumentSource for RegistryClient {
    fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_packument(&self, name: &str) -> Result<Value, PkgError> {
        let url = self.packument_url(name)?;

        debug!("http get {url}");

        let response = self
            .http
            .get(url.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        debug!("status {status}");

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PkgError::not_found(name));
        }

        if !status.is_success() {
            return Err(PkgError::registry(format!(
                "Registry returned status {status} for '{name}'"
            )));
        }

        // Registries do not reliably send a JSON content type
        let text = response.text().await?;
        let json: Value = serde_json::from_str(&text)?;
        trace!(packument = %json, "fetched packument");
        Ok(json)
    }
}

/// Fetch a packument, logging and swallowing every failure.
///
/// Not-found is logged at debug, an unreachable registry and any other
/// failure at error. All failures return `None`.
pub async fn fetch_package_info<R: PackumentSource>(source: &R, name: &str) -> Option<Value> {
    match source.fetch_packument(name).await {
        Ok(packument) => Some(packument),
        Err(e) if e.is_not_found() => {
            debug!(name, registry = source.url(), "package not on registry");
            None
        }
        Err(e) if e.is_unreachable() => {
            error!("can not reach to registry {}", source.url());
            debug!(error = %e, "connection failure");
            None
        }
        Err(e) => {
            error!(name, registry = source.url(), "{e}");
            None
        }
    }
}

/// Extract the latest version from a packument.
///
/// Uses `dist-tags.latest`; without it, falls back to the first version
/// whose value is the literal string `"latest"` (legacy documents).
#[must_use]
pub fn get_latest_version(packument: &Value) -> Option<&str> {
    if let Some(latest) = packument
        .get("dist-tags")
        .and_then(|tags| tags.get("latest"))
        .and_then(Value::as_str)
    {
        return Some(latest);
    }

    packument
        .get("versions")?
        .as_object()?
        .iter()
        .find(|(_, v)| v.as_str() == Some("latest"))
        .map(|(k, _)| k.as_str())
}

/// Get all available version strings from a packument, in document order.
#[must_use]
pub fn get_versions(packument: &Value) -> Vec<&str> {
    packument
        .get("versions")
        .and_then(|v| v.as_object())
        .map(|obj| obj.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

/// Check whether `version` is a known version of the packument.
#[must_use]
pub fn has_version(packument: &Value, version: &str) -> bool {
    packument
        .get("versions")
        .and_then(|v| v.as_object())
        .is_some_and(|obj| obj.contains_key(version))
}

/// Dependencies declared by one version, in declaration order.
///
/// Entries whose spec is not a string are skipped.
#[must_use]
pub fn get_dependencies(packument: &Value, version: &str) -> Vec<(String, String)> {
    packument
        .get("versions")
        .and_then(|v| v.get(version))
        .and_then(|v| v.get("dependencies"))
        .and_then(|d| d.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
