use crate::error::Error;
use crate::pkg::registry::{DEFAULT_REGISTRY, DEFAULT_UPSTREAM_REGISTRY};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::{Host, Url};

/// Runtime configuration for the upmkit CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Registry settings and manifest location for an add operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddEnv {
    /// Primary registry URL, without trailing slash.
    pub registry: String,
    /// Scope always written next to package names, derived from the registry host.
    pub namespace: String,
    /// Whether names missing from the primary registry are looked up upstream.
    pub upstream: bool,
    /// Upstream registry URL.
    pub upstream_registry: String,
    /// Manifest file to patch.
    pub manifest_path: PathBuf,
}

impl AddEnv {
    /// Build the environment from user options.
    ///
    /// A registry given without scheme gets `http://`; a trailing slash is
    /// removed.
    ///
    /// # Errors
    /// Returns an error if the registry URL cannot be parsed or has no host.
    pub fn from_options(
        registry: Option<&str>,
        upstream: bool,
        manifest_path: PathBuf,
    ) -> Result<Self, Error> {
        let registry = registry.map_or_else(|| DEFAULT_REGISTRY.to_string(), normalize_registry);
        let namespace = namespace_for(&registry)?;

        Ok(Self {
            registry,
            namespace,
            upstream,
            upstream_registry: DEFAULT_UPSTREAM_REGISTRY.to_string(),
            manifest_path,
        })
    }

    /// Override the upstream registry URL.
    #[must_use]
    pub fn with_upstream_registry(mut self, registry: &str) -> Self {
        self.upstream_registry = normalize_registry(registry);
        self
    }
}

/// Add a missing `http://` and drop a trailing slash.
#[must_use]
pub fn normalize_registry(registry: &str) -> String {
    let registry = registry.trim();
    let registry = if registry.to_lowercase().starts_with("http") {
        registry.to_string()
    } else {
        format!("http://{registry}")
    };
    registry.trim_end_matches('/').to_string()
}

/// Namespace scope for a registry.
///
/// An IP host is used as is; a domain yields its last two labels reversed,
/// so `package.openupm.com` becomes `com.openupm`.
///
/// # Errors
/// Returns an error if the URL cannot be parsed or has no host.
pub fn namespace_for(registry: &str) -> Result<String, Error> {
    let url = Url::parse(registry).map_err(|source| Error::InvalidRegistry {
        url: registry.to_string(),
        source,
    })?;

    match url.host() {
        Some(Host::Domain(domain)) => Ok(domain.rsplit('.').take(2).collect::<Vec<_>>().join(".")),
        Some(Host::Ipv4(ip)) => Ok(ip.to_string()),
        Some(Host::Ipv6(ip)) => Ok(ip.to_string()),
        None => Err(Error::RegistryWithoutHost(registry.to_string())),
    }
}
