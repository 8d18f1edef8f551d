//! Bulk scanner - enumerates every definition under a root into records.

use crate::bundle::AssetBundle;
use defcore::naming::{self, has_suffix};
use defcore::{ConfigError, Kind, LoaderError, Location, NamingMode, ScriptRecord};
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

static APPLICATION_NAMING: NamingMode = NamingMode::Application;

/// What a scan collects and how it names it
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions<'a> {
    /// File suffix filter (`.json`, `.so`)
    pub suffix: &'a str,
    /// Fixed kind for application roots; `None` routes each file by its
    /// first directory segment (engine roots)
    pub kind: Option<Kind>,
    pub naming: &'a NamingMode,
}

impl<'a> ScanOptions<'a> {
    /// Engine roots: JSON definitions routed by `models/`, `flows/`, `apis/`
    pub fn engine(naming: &'a NamingMode) -> Self {
        Self {
            suffix: ".json",
            kind: None,
            naming,
        }
    }

    /// Application roots hold a single kind each
    pub fn application(kind: Kind) -> Self {
        Self {
            suffix: kind.suffix(),
            kind: Some(kind),
            naming: &APPLICATION_NAMING,
        }
    }
}

/// Scan a location and return every matching definition.
///
/// A missing root or a root without any matching file is a configuration
/// error: an application without definitions cannot serve traffic.
pub fn scan(
    location: &Location,
    options: ScanOptions<'_>,
    bundle: Option<&dyn AssetBundle>,
) -> Result<Vec<ScriptRecord>, LoaderError> {
    let records = match location {
        Location::Filesystem(root) => scan_filesystem(root, options)?,
        Location::Embedded(root) => {
            let bundle = bundle.ok_or_else(|| ConfigError::NoBundle(location.to_string()))?;
            scan_bundle(root, options, bundle)?
        }
    };

    if records.is_empty() {
        return Err(ConfigError::NoDefinitions {
            root: location.to_string(),
            filter: options.suffix.to_string(),
        }
        .into());
    }

    info!("Scanned {} definitions from {}", records.len(), location);
    Ok(records)
}

fn scan_filesystem(root: &Path, options: ScanOptions<'_>) -> Result<Vec<ScriptRecord>, LoaderError> {
    if !root.exists() {
        return Err(ConfigError::MissingRoot(root.display().to_string()).into());
    }

    let mut records = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            LoaderError::read(path, e.into())
        })?;

        if !entry.file_type().is_file() || !has_suffix(entry.path(), options.suffix) {
            continue;
        }

        if let Some(record) = read_script(root, entry.path(), options)? {
            records.push(record);
        }
    }

    Ok(records)
}

fn scan_bundle(
    root: &str,
    options: ScanOptions<'_>,
    bundle: &dyn AssetBundle,
) -> Result<Vec<ScriptRecord>, LoaderError> {
    let root = root.trim_matches('/');
    if options.kind.map(|kind| kind.loads_by_path()).unwrap_or(false) {
        return Err(ConfigError::EmbeddedPlugins(root.to_string()).into());
    }

    let prefix = if root.is_empty() {
        String::new()
    } else {
        format!("{}/", root)
    };

    let mut names: Vec<String> = bundle
        .names()
        .into_iter()
        .filter(|name| name.starts_with(&prefix))
        .collect();
    if names.is_empty() {
        return Err(ConfigError::MissingRoot(format!("bin://{}", root)).into());
    }
    names.sort();

    let mut records = Vec::new();
    for name in names.iter().filter(|name| name.ends_with(options.suffix)) {
        let named = naming::asset_identifier(root, name, options.naming);
        let Some(kind) = resolve_kind(options.kind, named.kind_segment.as_deref(), name) else {
            continue;
        };
        if kind.loads_by_path() || !name.ends_with(kind.suffix()) {
            debug!("Skipping embedded asset {} for {} definitions", name, kind);
            continue;
        }

        let content = bundle.read(name).ok_or_else(|| {
            LoaderError::read(
                name.as_str(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "asset listed but not readable"),
            )
        })?;
        records.push(ScriptRecord::with_content(named.id, kind, content.into_owned()));
    }

    Ok(records)
}

/// Read one definition file under `root` into a record.
///
/// Returns `Ok(None)` when the file does not belong to any kind (engine roots
/// with an unknown first segment) or does not carry its kind's suffix.
pub fn read_script(
    root: &Path,
    path: &Path,
    options: ScanOptions<'_>,
) -> Result<Option<ScriptRecord>, LoaderError> {
    let named = naming::identifier(root, path, options.naming);
    let label = path.display().to_string();
    let Some(kind) = resolve_kind(options.kind, named.kind_segment.as_deref(), &label) else {
        return Ok(None);
    };

    if !has_suffix(path, kind.suffix()) {
        debug!("Skipping {} for {} definitions", label, kind);
        return Ok(None);
    }

    if kind.loads_by_path() {
        return Ok(Some(ScriptRecord::with_file(named.id, kind, path)));
    }

    let content = std::fs::read(path).map_err(|e| LoaderError::read(path, e))?;
    Ok(Some(ScriptRecord::with_content(named.id, kind, content)))
}

fn resolve_kind(fixed: Option<Kind>, segment: Option<&str>, label: &str) -> Option<Kind> {
    if fixed.is_some() {
        return fixed;
    }

    let kind = segment.and_then(Kind::from_dir_name);
    if kind.is_none() {
        debug!("Skipping {}: not under a definition directory", label);
    }
    kind
}
