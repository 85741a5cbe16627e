#![deny(warnings)]
pub mod belief;
pub mod game;
pub mod knowledge;

pub struct AppInfo;

impl AppInfo {
    pub const fn name() -> &'static str {
        "mdgenie"
    }

    pub const fn codename() -> &'static str {
        "Lamp"
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
