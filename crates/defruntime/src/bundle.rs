use std::borrow::Cow;
use std::collections::BTreeMap;

/// Read-only set of assets compiled into the binary (`bin://` locations)
pub trait AssetBundle: Send + Sync {
    /// All asset names, `/`-separated
    fn names(&self) -> Vec<String>;

    fn read(&self, name: &str) -> Option<Cow<'_, [u8]>>;
}

/// Bundle over a static table, typically filled with `include_bytes!`
#[derive(Debug, Clone, Copy)]
pub struct StaticBundle {
    assets: &'static [(&'static str, &'static [u8])],
}

impl StaticBundle {
    pub const fn new(assets: &'static [(&'static str, &'static [u8])]) -> Self {
        Self { assets }
    }
}

impl AssetBundle for StaticBundle {
    fn names(&self) -> Vec<String> {
        self.assets.iter().map(|(name, _)| name.to_string()).collect()
    }

    fn read(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        self.assets
            .iter()
            .find(|(asset, _)| *asset == name)
            .map(|(_, bytes)| Cow::Borrowed(*bytes))
    }
}

/// Owned in-memory bundle
#[derive(Debug, Default, Clone)]
pub struct MemoryBundle {
    assets: BTreeMap<String, Vec<u8>>,
}

impl MemoryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.assets.insert(name.into(), content.into());
    }
}

impl AssetBundle for MemoryBundle {
    fn names(&self) -> Vec<String> {
        self.assets.keys().cloned().collect()
    }

    fn read(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        self.assets.get(name).map(|bytes| Cow::Borrowed(bytes.as_slice()))
    }
}
