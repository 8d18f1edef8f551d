//! File-to-identifier naming convention.
//!
//! The same functions name a definition when it is bulk loaded and when a
//! watch event later replaces or deletes it, so both paths always agree on
//! the identifier.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Dotted name under which a definition is registered
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::new(s)
    }
}

/// How identifiers are derived from relative paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum NamingMode {
    /// Built-in definitions: the first segment names the kind and is dropped,
    /// the rest is namespaced under `prefix`
    Engine { prefix: String },
    /// Application definitions: the full dotted path, unprefixed
    Application,
}

impl NamingMode {
    pub fn engine(prefix: impl Into<String>) -> Self {
        NamingMode::Engine {
            prefix: prefix.into(),
        }
    }
}

/// Result of naming a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Named {
    pub id: Identifier,
    /// Leading segment consumed in engine mode (`models`, `flows`, ...)
    pub kind_segment: Option<String>,
}

/// Name a file on disk relative to `root`.
///
/// Paths that do not lie under `root` are named as given.
pub fn identifier(root: &Path, file: &Path, mode: &NamingMode) -> Named {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let segments = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    name_segments(segments, mode)
}

/// Name an embedded asset (always `/`-separated) relative to `root`
pub fn asset_identifier(root: &str, asset: &str, mode: &NamingMode) -> Named {
    let root = root.trim_matches('/');
    let relative = if root.is_empty() {
        asset
    } else {
        asset
            .strip_prefix(root)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(asset)
    };

    let segments = relative
        .split('/')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();

    name_segments(segments, mode)
}

fn name_segments(mut segments: Vec<String>, mode: &NamingMode) -> Named {
    // Everything after the first dot of the file name is extension
    if let Some(last) = segments.last_mut() {
        if let Some(idx) = last.find('.') {
            last.truncate(idx);
        }
    }
    segments.retain(|segment| !segment.is_empty());

    match mode {
        NamingMode::Application => Named {
            id: Identifier(segments.join(".")),
            kind_segment: None,
        },
        NamingMode::Engine { prefix } => {
            let kind_segment = if segments.is_empty() {
                None
            } else {
                Some(segments.remove(0))
            };

            let rest = segments.join(".");
            let id = match (prefix.is_empty(), rest.is_empty()) {
                (true, _) => rest,
                (false, true) => prefix.clone(),
                (false, false) => format!("{}.{}", prefix, rest),
            };

            Named {
                id: Identifier(id),
                kind_segment,
            }
        }
    }
}

const COMPANION_EXTENSION: &str = "js";
const FLOW_DEFINITION_SUFFIX: &str = ".flow.json";

/// Map a flow's companion script (`login.js`) to its paired definition
/// (`login.flow.json`) in the same directory. Returns `None` for anything
/// that is not a companion script.
pub fn companion_definition(path: &Path) -> Option<PathBuf> {
    if path.extension()? != COMPANION_EXTENSION {
        return None;
    }

    let file_name = path.file_name()?.to_string_lossy();
    let base = file_name.split('.').next().filter(|base| !base.is_empty())?;
    Some(path.with_file_name(format!("{}{}", base, FLOW_DEFINITION_SUFFIX)))
}

/// Suffix check on the full file name, so `.flow.json` style suffixes work
pub fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(suffix))
        .unwrap_or(false)
}
