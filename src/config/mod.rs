// Configuration management module
// Handles TOML configuration for providers, search mode, and chunking

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, EmbeddingConfig, GeminiConfig, ProviderKind, SearchConfig, SearchMode,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
