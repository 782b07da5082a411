use crate::error::ConfigError;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    AlertingSettings, Config, EngineSettings, SegmentSettings, DEFAULT_TARGET_STOCK,
};

/// Loads the engine configuration from the `config.toml` file.
///
/// This function is the primary entry point for this crate. It reads the
/// configuration file, deserializes it into our strongly-typed `Config`
/// struct, validates it, and returns it.
pub fn load_config() -> Result<Config, ConfigError> {
    load_from("config.toml")
}

/// Loads the configuration from an explicit path. Used by `load_config` and
/// by callers that keep their config outside the working directory.
pub fn load_from(path: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path))
        // Environment variables win over the file, e.g. LANDMARK__ENGINE__CADENCE.
        .add_source(config::Environment::with_prefix("LANDMARK").separator("__"))
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}
