pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, IngestConfig, IntentConfig, LlmConfig, LlmProvider, OllamaConfig,
    PromptConfig, RetrievalConfig, ServerConfig, StorageConfig, UploadMode,
};
