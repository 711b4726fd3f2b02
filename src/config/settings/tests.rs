use super::*;
use serial_test::serial;
use std::collections::HashMap;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.server.max_upload_bytes, 52_428_800);
    assert!(config.server.pages.contains(&"login".to_string()));
    assert_eq!(config.storage.document_dir, PathBuf::from("data"));
    assert_eq!(config.storage.vector_db_path, PathBuf::from("vectordb"));
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.model, "bge-m3:latest");
    assert_eq!(config.ollama.batch_size, 16);
    assert_eq!(config.llm.provider, LlmProvider::Gemini);
    assert_eq!(config.llm.model, "gemini-2.0-flash");
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.chunking.chunk_overlap, 100);
    assert_eq!(config.retrieval.top_k, 7);
    assert_eq!(config.ingest.upload_mode, UploadMode::Retrain);
    assert!(config.intent.student_keywords.contains(&"học kỳ".to_string()));
    assert!(config.intent.admission_keywords.contains(&"học phí".to_string()));
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.server.port = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidPort(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.llm.model = "  ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));

    let mut invalid_config = config;
    invalid_config.llm.base_url = Some("not a url".to_string());
    assert!(invalid_config.validate().is_err());
}

#[test]
fn chunking_validation() {
    let mut config = Config::default();
    config.chunking.chunk_overlap = 500;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(500, 500))
    ));

    config.chunking.chunk_size = 0;
    config.chunking.chunk_overlap = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidChunkSize(0))
    ));
}

#[test]
fn retry_attempts_are_bounded() {
    let mut config = Config::default();
    config.llm.retry_attempts = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidRetryAttempts(0))
    ));

    config.llm.retry_attempts = 100;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidRetryAttempts(100))
    ));

    config.llm.retry_attempts = 10;
    assert!(config.validate().is_ok());
}

#[test]
fn vector_store_must_not_contain_documents() {
    let mut config = Config::default();
    config.storage.vector_db_path = config.storage.document_dir.clone();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlappingStorage(_, _))
    ));

    config.storage.vector_db_path = PathBuf::from(".");
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlappingStorage(_, _))
    ));

    config.storage.vector_db_path = PathBuf::from("index/vectordb");
    assert!(config.validate().is_ok());
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let toml_str = r#"
[llm]
provider = "ollama"
model = "llama3.2"

[ingest]
upload_mode = "append"
"#;
    let config: Config = toml::from_str(toml_str).expect("should parse partial toml");

    assert_eq!(config.llm.provider, LlmProvider::Ollama);
    assert_eq!(config.llm.model, "llama3.2");
    assert_eq!(config.llm.timeout_seconds, 60);
    assert_eq!(config.ingest.upload_mode, UploadMode::Append);
    assert_eq!(config.server, ServerConfig::default());
    assert_eq!(config.chunking, ChunkingConfig::default());
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_model("new-model".to_string()).is_ok());
    assert!(config.set_batch_size(128).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_protocol("HTTP".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_model(String::new()).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_batch_size(1001).is_err());

    let mut llm = LlmConfig::default();
    assert!(llm.set_model("gemini-1.5-pro".to_string()).is_ok());
    assert!(llm.set_model(String::new()).is_err());
    assert!(
        llm.set_base_url(Some("http://localhost:9999".to_string()))
            .is_ok()
    );
    assert!(llm.set_base_url(Some("::bad::".to_string())).is_err());
    assert_eq!(llm.base_url.as_deref(), Some("http://localhost:9999"));
}

#[test]
fn env_overrides() {
    let vars: HashMap<&str, &str> = [
        ("GEMINI_API_KEY", "secret"),
        ("EMBEDDING_MODEL", "nomic-embed-text"),
    ]
    .into_iter()
    .collect();

    let mut config = Config::default();
    config.apply_env_overrides_from(|key| vars.get(key).map(|v| (*v).to_string()));

    assert_eq!(config.llm.api_key.as_deref(), Some("secret"));
    assert_eq!(config.ollama.model, "nomic-embed-text");
}

#[test]
fn legacy_api_key_variable() {
    let mut config = Config::default();
    config.apply_env_overrides_from(|key| {
        (key == LEGACY_API_KEY_ENV).then(|| "legacy".to_string())
    });
    assert_eq!(config.llm.api_key.as_deref(), Some("legacy"));

    let mut config = Config::default();
    config.apply_env_overrides_from(|key| match key {
        API_KEY_ENV => Some("primary".to_string()),
        LEGACY_API_KEY_ENV => Some("legacy".to_string()),
        _ => None,
    });
    assert_eq!(config.llm.api_key.as_deref(), Some("primary"));
}

#[test]
fn empty_env_values_are_ignored() {
    let mut config = Config::default();
    config.apply_env_overrides_from(|_| Some("   ".to_string()));

    assert_eq!(config.llm.api_key, None);
    assert_eq!(config.ollama.model, "bge-m3:latest");
}

#[test]
fn paths_resolve_against_base_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };

    assert_eq!(config.document_dir(), temp_dir.path().join("data"));
    assert_eq!(config.vector_db_path(), temp_dir.path().join("vectordb"));
    assert_eq!(config.static_dir(), temp_dir.path().join("static"));

    let absolute = temp_dir.path().join("elsewhere");
    config.storage.vector_db_path = absolute.clone();
    assert_eq!(config.vector_db_path(), absolute);
}

#[test]
#[serial]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    config.server.port = 9000;
    config.retrieval.top_k = 3;
    config.prompt.institution = "Trường Thử Nghiệm".to_string();

    config.save().expect("should save config");
    assert!(temp_dir.path().join("config.toml").exists());

    let loaded = Config::load(temp_dir.path()).expect("should load config");
    assert_eq!(loaded.server.port, 9000);
    assert_eq!(loaded.retrieval.top_k, 3);
    assert_eq!(loaded.prompt.institution, "Trường Thử Nghiệm");
    assert_eq!(loaded.get_base_dir(), temp_dir.path());
}

#[test]
#[serial]
fn load_missing_config_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.server.port, 8000);
    assert_eq!(config.retrieval.top_k, 7);
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
#[serial]
fn load_applies_process_environment() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    // SAFETY: serialized with every other test that reads the environment.
    unsafe { std::env::set_var(EMBEDDING_MODEL_ENV, "multilingual-e5:latest") };

    let loaded = Config::load(temp_dir.path());

    // SAFETY: as above.
    unsafe { std::env::remove_var(EMBEDDING_MODEL_ENV) };
    let config = loaded.expect("should load config");
    assert_eq!(config.ollama.model, "multilingual-e5:latest");
}

#[test]
#[serial]
fn load_rejects_invalid_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\ntop_k = 0\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn save_rejects_invalid_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    config.ollama.batch_size = 0;

    assert!(config.save().is_err());
    assert!(!temp_dir.path().join("config.toml").exists());
}
