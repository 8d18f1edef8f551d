use crate::ConfigError;
use std::fmt;
use std::path::PathBuf;

const FS_SCHEME: &str = "fs://";
const BIN_SCHEME: &str = "bin://";

/// Where a set of definitions lives.
///
/// Parsed once from a configuration string and passed around as a typed value:
/// `fs://<path>` or a bare `<path>` is a filesystem root, `bin://<path>` is a
/// logical root inside an embedded asset bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Filesystem(PathBuf),
    Embedded(String),
}

impl Location {
    pub fn parse(location: &str) -> Result<Self, ConfigError> {
        if let Some(root) = location.strip_prefix(FS_SCHEME) {
            return Ok(Location::Filesystem(PathBuf::from(root)));
        }

        if let Some(root) = location.strip_prefix(BIN_SCHEME) {
            return Ok(Location::Embedded(root.trim_matches('/').to_string()));
        }

        match location.find("://") {
            None => Ok(Location::Filesystem(PathBuf::from(location))),
            Some(idx) => Err(ConfigError::UnsupportedScheme {
                scheme: location[..idx].to_string(),
                location: location.to_string(),
            }),
        }
    }

    /// Only filesystem roots can be observed for changes
    pub fn watchable(&self) -> bool {
        matches!(self, Location::Filesystem(_))
    }

    pub fn as_path(&self) -> Option<&PathBuf> {
        match self {
            Location::Filesystem(root) => Some(root),
            Location::Embedded(_) => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Filesystem(root) => write!(f, "{}{}", FS_SCHEME, root.display()),
            Location::Embedded(root) => write!(f, "{}{}", BIN_SCHEME, root),
        }
    }
}

impl std::str::FromStr for Location {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::parse(s)
    }
}
