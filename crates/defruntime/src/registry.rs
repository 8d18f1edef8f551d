use defcore::{
    ApiDefinition, Definition, DefinitionBody, Identifier, Kind, Registries, Registry,
    RegistryError,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// In-memory registry of loaded definitions for one kind.
///
/// Entries are stored behind `Arc`, so a reader clones a complete definition
/// and a reload swaps the whole entry under the write lock.
pub struct DefinitionRegistry {
    kind: Kind,
    entries: RwLock<HashMap<Identifier, Arc<Definition>>>,
}

impl DefinitionRegistry {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn insert(&self, id: &Identifier, body: DefinitionBody) {
        let definition = Arc::new(Definition {
            id: id.clone(),
            kind: self.kind,
            body,
        });

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = entries.insert(id.clone(), definition).is_some();
        tracing::debug!(
            "{} {} {}",
            if replaced { "Replaced" } else { "Registered" },
            self.kind,
            id
        );
    }

    fn validate(&self, id: &Identifier, value: &serde_json::Value) -> Result<(), RegistryError> {
        if !value.is_object() {
            return Err(RegistryError::Invalid {
                kind: self.kind,
                id: id.to_string(),
                reason: "definition must be a JSON object".to_string(),
            });
        }

        if self.kind == Kind::Api {
            ApiDefinition::from_json(value).map_err(|e| RegistryError::Invalid {
                kind: self.kind,
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }
}

impl Registry for DefinitionRegistry {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn load(&self, id: &Identifier, content: &[u8]) -> Result<(), RegistryError> {
        if self.kind.loads_by_path() {
            return Err(RegistryError::Invalid {
                kind: self.kind,
                id: id.to_string(),
                reason: "plugins are loaded from files, not content".to_string(),
            });
        }

        let value: serde_json::Value =
            serde_json::from_slice(content).map_err(|e| RegistryError::Parse {
                kind: self.kind,
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        self.validate(id, &value)?;

        self.insert(id, DefinitionBody::Json { value });
        Ok(())
    }

    fn load_from_file(&self, id: &Identifier, path: &Path) -> Result<(), RegistryError> {
        if !self.kind.loads_by_path() {
            return Err(RegistryError::Unsupported { kind: self.kind });
        }

        let metadata = std::fs::metadata(path).map_err(|e| RegistryError::Plugin {
            id: id.to_string(),
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !metadata.is_file() {
            return Err(RegistryError::Plugin {
                id: id.to_string(),
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }

        self.insert(
            id,
            DefinitionBody::Plugin {
                path: path.to_path_buf(),
            },
        );
        Ok(())
    }

    fn delete(&self, id: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(id).is_some()
    }

    fn exists(&self, id: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(id)
    }

    fn get(&self, id: &str) -> Option<Arc<Definition>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(id).cloned()
    }

    fn ids(&self) -> Vec<Identifier> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<Identifier> = entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }
}

/// Fresh in-memory registries, one per kind
pub fn in_memory_registries() -> Registries {
    Registries {
        models: Arc::new(DefinitionRegistry::new(Kind::Model)),
        flows: Arc::new(DefinitionRegistry::new(Kind::Flow)),
        apis: Arc::new(DefinitionRegistry::new(Kind::Api)),
        plugins: Arc::new(DefinitionRegistry::new(Kind::Plugin)),
    }
}
