//! In-memory packument sources for tests.

use super::error::PkgError;
use super::registry::PackumentSource;
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;

/// A registry backed by a map, recording every lookup.
pub(crate) struct MemoryRegistry {
    url: String,
    packuments: HashMap<String, Value>,
    unreachable: bool,
    requests: RefCell<Vec<String>>,
}

impl MemoryRegistry {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            packuments: HashMap::new(),
            unreachable: false,
            requests: RefCell::new(Vec::new()),
        }
    }

    /// A registry that fails every lookup with a connection error.
    pub(crate) fn unreachable(url: &str) -> Self {
        Self {
            unreachable: true,
            ..Self::new(url)
        }
    }

    pub(crate) fn with(mut self, name: &str, packument: Value) -> Self {
        self.packuments.insert(name.to_string(), packument);
        self
    }

    /// Names looked up so far, in order.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl PackumentSource for MemoryRegistry {
    fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_packument(&self, name: &str) -> Result<Value, PkgError> {
        self.requests.borrow_mut().push(name.to_string());

        if self.unreachable {
            return Err(PkgError::unreachable(format!(
                "Connection failed: {}",
                self.url
            )));
        }

        self.packuments
            .get(name)
            .cloned()
            .ok_or_else(|| PkgError::not_found(name))
    }
}

/// Build a packument with `dist-tags.latest` and the given versions.
///
/// Each version lists its dependencies in declaration order.
pub(crate) fn packument(latest: &str, versions: &[(&str, &[(&str, &str)])]) -> Value {
    let mut versions_obj = Map::new();
    for (version, deps) in versions {
        let mut deps_obj = Map::new();
        for (name, spec) in *deps {
            deps_obj.insert((*name).to_string(), json!(spec));
        }
        versions_obj.insert(
            (*version).to_string(),
            json!({ "version": version, "dependencies": deps_obj }),
        );
    }

    json!({
        "dist-tags": { "latest": latest },
        "versions": versions_obj
    })
}
