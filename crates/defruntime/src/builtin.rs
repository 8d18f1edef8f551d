use crate::bundle::{AssetBundle, StaticBundle};
use std::sync::Arc;

macro_rules! asset {
    ($name:literal) => {
        (
            $name,
            include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/", $name)) as &[u8],
        )
    };
}

const ASSETS: &[(&str, &[u8])] = &[
    asset!("xiang/apis/system.json"),
    asset!("xiang/flows/sys/summary.flow.json"),
    asset!("xiang/models/setting.json"),
];

/// Engine definitions compiled into the binaries, served from `bin://xiang`
pub static BUILTIN: StaticBundle = StaticBundle::new(ASSETS);

pub fn builtin_bundle() -> Arc<dyn AssetBundle> {
    Arc::new(BUILTIN)
}
