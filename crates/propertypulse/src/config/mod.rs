pub mod loader;
pub mod schema;

pub use loader::{
    default_config_path, load_config, load_config_from_str, load_config_or_default,
    validate_config,
};
pub use schema::{
    AdaptersConfig, Config, EventsConfig, ListingConfig, LoggingConfig, PipelineConfig,
    RetryConfig, ServerConfig, StorageConfig,
};
