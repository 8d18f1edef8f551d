use crate::{Identifier, Kind, RegistryError, ScriptRecord};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A loaded definition as held by a registry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Definition {
    pub id: Identifier,
    pub kind: Kind,
    pub body: DefinitionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DefinitionBody {
    Json { value: serde_json::Value },
    Plugin { path: PathBuf },
}

impl Definition {
    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.body {
            DefinitionBody::Json { value } => Some(value),
            DefinitionBody::Plugin { .. } => None,
        }
    }

    pub fn plugin_path(&self) -> Option<&Path> {
        match &self.body {
            DefinitionBody::Plugin { path } => Some(path),
            DefinitionBody::Json { .. } => None,
        }
    }
}

/// Identifier to definition mapping for one kind.
///
/// Implementations must be safe for concurrent use: `load` replaces an entry
/// as a whole, so readers observe either the previous or the new definition.
pub trait Registry: Send + Sync {
    /// Kind of definitions this registry holds
    fn kind(&self) -> Kind;

    /// Create or replace the definition named `id`
    fn load(&self, id: &Identifier, content: &[u8]) -> Result<(), RegistryError>;

    /// Create or replace a definition that the engine loads by path
    fn load_from_file(&self, id: &Identifier, path: &Path) -> Result<(), RegistryError> {
        let _ = (id, path);
        Err(RegistryError::Unsupported { kind: self.kind() })
    }

    /// Remove `id`; returns true if something was removed
    fn delete(&self, id: &str) -> bool;

    fn exists(&self, id: &str) -> bool;

    fn get(&self, id: &str) -> Option<Arc<Definition>>;

    /// All identifiers, sorted
    fn ids(&self) -> Vec<Identifier>;

    fn len(&self) -> usize {
        self.ids().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand a scanned record to the registry using the loader it calls for
    fn load_record(&self, record: &ScriptRecord) -> Result<(), RegistryError> {
        match (record.content(), record.file_path()) {
            (Some(content), _) => self.load(&record.name, content),
            (None, Some(path)) => self.load_from_file(&record.name, path),
            (None, None) => Err(RegistryError::Invalid {
                kind: record.kind,
                id: record.name.to_string(),
                reason: "record has neither content nor file path".to_string(),
            }),
        }
    }
}

/// One registry per kind, injected into the loader
#[derive(Clone)]
pub struct Registries {
    pub models: Arc<dyn Registry>,
    pub flows: Arc<dyn Registry>,
    pub apis: Arc<dyn Registry>,
    pub plugins: Arc<dyn Registry>,
}

impl Registries {
    pub fn for_kind(&self, kind: Kind) -> &Arc<dyn Registry> {
        match kind {
            Kind::Model => &self.models,
            Kind::Flow => &self.flows,
            Kind::Api => &self.apis,
            Kind::Plugin => &self.plugins,
        }
    }

    /// Definition counts per kind, in `Kind::ALL` order
    pub fn counts(&self) -> Vec<(Kind, usize)> {
        Kind::ALL
            .into_iter()
            .map(|kind| (kind, self.for_kind(kind).len()))
            .collect()
    }
}
