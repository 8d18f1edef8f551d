// crates/defcore/src/events/mod.rs

mod bus;

pub use bus::{EventBus, ReloadEvent};
