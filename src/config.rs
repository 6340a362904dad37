use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Freight Sentinel";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// File name the CLI looks for in the data directory when no config is given.
pub const CONFIG_FILE_NAME: &str = "sentinel.json";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "freight_sentinel=info"
}

/// Get the application data directory
/// ~/FreightSentinel/ on all platforms. `None` when no home directory can be determined.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("FreightSentinel"))
}

/// Default config location: `<data dir>/sentinel.json`
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
