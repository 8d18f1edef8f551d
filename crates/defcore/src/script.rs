use crate::{Identifier, Kind};
use std::path::{Path, PathBuf};

/// One definition file read from disk or from an embedded bundle.
///
/// Text definitions carry their `content`; plugin artifacts carry the
/// `file_path` the engine loads them from instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    pub name: Identifier,
    pub kind: Kind,
    pub content: Option<Vec<u8>>,
    pub file_path: Option<PathBuf>,
}

impl ScriptRecord {
    pub fn with_content(name: Identifier, kind: Kind, content: Vec<u8>) -> Self {
        Self {
            name,
            kind,
            content: Some(content),
            file_path: None,
        }
    }

    pub fn with_file(name: Identifier, kind: Kind, file_path: impl Into<PathBuf>) -> Self {
        Self {
            name,
            kind,
            content: None,
            file_path: Some(file_path.into()),
        }
    }

    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }
}
