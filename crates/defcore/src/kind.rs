use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a definition; each kind has its own registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Model,
    Flow,
    Api,
    Plugin,
}

impl Kind {
    pub const ALL: [Kind; 4] = [Kind::Model, Kind::Flow, Kind::Api, Kind::Plugin];

    /// Directory name under an engine root (`models`, `flows`, ...)
    pub fn dir_name(&self) -> &'static str {
        match self {
            Kind::Model => "models",
            Kind::Flow => "flows",
            Kind::Api => "apis",
            Kind::Plugin => "plugins",
        }
    }

    pub fn from_dir_name(name: &str) -> Option<Kind> {
        Kind::ALL.into_iter().find(|kind| kind.dir_name() == name)
    }

    /// Suffix a file must carry to be treated as a definition of this kind
    pub fn suffix(&self) -> &'static str {
        match self {
            Kind::Plugin => ".so",
            _ => ".json",
        }
    }

    /// Plugins are native artifacts loaded by path, everything else by content
    pub fn loads_by_path(&self) -> bool {
        matches!(self, Kind::Plugin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Model => "model",
            Kind::Flow => "flow",
            Kind::Api => "api",
            Kind::Plugin => "plugin",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
