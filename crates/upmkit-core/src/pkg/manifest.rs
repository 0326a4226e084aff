//! Project manifest (`Packages/manifest.json`) access.
//!
//! The document is kept as an ordered JSON object. `dependencies` and
//! `scopedRegistries` are read and edited in place, so saving keeps every
//! other key and the original key order.

use super::error::PkgError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::Path;

/// Manifest location relative to the project root.
pub const MANIFEST_PATH: &str = "Packages/manifest.json";

const DEPENDENCIES: &str = "dependencies";
const SCOPED_REGISTRIES: &str = "scopedRegistries";

/// The project manifest document.
///
/// `dependencies` is an object and `scopedRegistries` an array of objects
/// whenever present; [`Manifest::from_json`] rejects anything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    doc: Map<String, Value>,
}

/// A read-only view of one `scopedRegistries` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScopedRegistry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl ScopedRegistry {
    /// Check whether this entry points at `registry`, ignoring a trailing slash.
    #[must_use]
    pub fn matches_url(&self, registry: &str) -> bool {
        same_registry(&self.url, registry)
    }
}

fn same_registry(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

fn entry_url(entry: &Map<String, Value>) -> &str {
    entry.get("url").and_then(Value::as_str).unwrap_or_default()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Manifest {
    /// Parse a manifest from JSON text.
    ///
    /// # Errors
    /// Returns `MANIFEST_INVALID` if the text is not an object, or if
    /// `dependencies` or `scopedRegistries` has the wrong shape.
    pub fn from_json(content: &str) -> Result<Self, PkgError> {
        let doc: Map<String, Value> =
            serde_json::from_str(content).map_err(|e| PkgError::manifest_invalid(e.to_string()))?;

        if let Some(deps) = doc.get(DEPENDENCIES).filter(|v| !v.is_object()) {
            return Err(PkgError::manifest_invalid(format!(
                "\"{DEPENDENCIES}\" must be an object, got {}",
                json_type_name(deps)
            )));
        }

        if let Some(registries) = doc.get(SCOPED_REGISTRIES) {
            let well_formed = registries
                .as_array()
                .is_some_and(|entries| entries.iter().all(Value::is_object));
            if !well_formed {
                return Err(PkgError::manifest_invalid(format!(
                    "\"{SCOPED_REGISTRIES}\" must be an array of objects, got {}",
                    json_type_name(registries)
                )));
            }
        }

        Ok(Self { doc })
    }

    /// Load the manifest at `path`.
    ///
    /// # Errors
    /// Returns `MANIFEST_NOT_FOUND` if the file does not exist and
    /// `MANIFEST_INVALID` if it cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, PkgError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PkgError::manifest_not_found(path));
            }
            Err(e) => {
                return Err(PkgError::manifest_invalid(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        Self::from_json(&content).map_err(|e| {
            PkgError::manifest_invalid(format!(
                "failed to parse {}: {}",
                path.display(),
                e.message()
            ))
        })
    }

    /// Serialize as 2-space indented JSON.
    ///
    /// # Errors
    /// Returns `MANIFEST_WRITE_FAILED` if serialization fails.
    pub fn to_json(&self) -> Result<String, PkgError> {
        serde_json::to_string_pretty(self).map_err(|e| PkgError::manifest_write_failed(e.to_string()))
    }

    /// Write the manifest to `path`.
    ///
    /// # Errors
    /// Returns `MANIFEST_WRITE_FAILED` if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), PkgError> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| {
            PkgError::manifest_write_failed(format!(
                "can not write manifest json file {}: {e}",
                path.display()
            ))
        })
    }

    /// Raw top-level value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.doc.get(key)
    }

    /// Version spec currently recorded for `name`.
    #[must_use]
    pub fn dependency(&self, name: &str) -> Option<&str> {
        self.doc.get(DEPENDENCIES)?.get(name)?.as_str()
    }

    /// Record `version` for `name`, returning the previous value.
    ///
    /// A missing `dependencies` object is appended to the document; an
    /// existing entry keeps its position.
    pub fn set_dependency(&mut self, name: &str, version: &str) -> Option<Value> {
        object_entry(&mut self.doc, DEPENDENCIES)
            .insert(name.to_string(), Value::String(version.to_string()))
    }

    /// All scoped registry entries, in document order.
    #[must_use]
    pub fn scoped_registries(&self) -> Vec<ScopedRegistry> {
        self.doc
            .get(SCOPED_REGISTRIES)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| ScopedRegistry::deserialize(entry).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Scoped registry entry for `registry`, if any.
    #[must_use]
    pub fn scoped_registry(&self, registry: &str) -> Option<ScopedRegistry> {
        self.scoped_registries()
            .into_iter()
            .find(|entry| entry.matches_url(registry))
    }

    /// The entry object for `registry`, appended as
    /// `{name, url, scopes: []}` when missing.
    ///
    /// Returns the entry and whether it was created.
    pub fn scoped_registry_entry(
        &mut self,
        registry: &str,
        name: &str,
    ) -> (&mut Map<String, Value>, bool) {
        let entries = array_entry(&mut self.doc, SCOPED_REGISTRIES);

        let found = entries.iter().position(|entry| {
            entry
                .as_object()
                .is_some_and(|entry| same_registry(entry_url(entry), registry))
        });

        let (index, created) = match found {
            Some(index) => (index, false),
            None => {
                let mut entry = Map::new();
                entry.insert("name".to_string(), Value::String(name.to_string()));
                entry.insert("url".to_string(), Value::String(registry.to_string()));
                entry.insert("scopes".to_string(), Value::Array(Vec::new()));
                entries.push(Value::Object(entry));
                (entries.len() - 1, true)
            }
        };

        match &mut entries[index] {
            Value::Object(entry) => (entry, created),
            _ => unreachable!("scoped registry entries are objects"),
        }
    }
}

/// Scope names stored in a scoped registry entry object.
#[must_use]
pub fn entry_scopes(entry: &Map<String, Value>) -> Vec<String> {
    entry
        .get("scopes")
        .and_then(Value::as_array)
        .map(|scopes| {
            scopes
                .iter()
                .filter_map(|s| s.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Replace the scopes of an entry object, keeping the key's position.
pub fn set_entry_scopes(entry: &mut Map<String, Value>, scopes: Vec<String>) {
    entry.insert(
        "scopes".to_string(),
        Value::Array(scopes.into_iter().map(Value::String).collect()),
    );
}

fn object_entry<'m>(doc: &'m mut Map<String, Value>, key: &str) -> &'m mut Map<String, Value> {
    let value = doc
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()));
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn array_entry<'m>(doc: &'m mut Map<String, Value>, key: &str) -> &'m mut Vec<Value> {
    let value = doc.entry(key).or_insert_with(|| Value::Array(Vec::new()));
    if !value.is_array() {
        *value = Value::Array(Vec::new());
    }
    match value {
        Value::Array(items) => items,
        _ => unreachable!(),
    }
}
