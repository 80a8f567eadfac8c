// Build-time identity, logged at startup

/// Package version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Binary/package name (from Cargo.toml).
pub const NAME: &str = env!("CARGO_PKG_NAME");
