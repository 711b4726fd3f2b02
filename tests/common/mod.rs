//! Fake Ollama server shared by the integration tests.

use std::net::SocketAddr;
use std::path::Path;

use chatbot_rag::config::{Config, LlmProvider};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const EMBEDDING_MODEL: &str = "bge-m3:latest";
pub const DIMENSION: usize = 16;

/// Answers `/api/embed` with character histograms so similar texts land close
/// together.
pub struct HistogramEmbeddings;

impl Respond for HistogramEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let embeddings: Vec<Vec<f32>> = body["input"]
            .as_array()
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|text| histogram(text.as_str().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default();

        ResponseTemplate::new(200).set_body_json(json!({
            "model": EMBEDDING_MODEL,
            "embeddings": embeddings,
        }))
    }
}

pub fn histogram(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSION];
    for c in text.chars() {
        if let Some(slot) = vector.get_mut(c as usize % DIMENSION) {
            *slot += 1.0;
        }
    }
    vector
}

pub async fn start_ollama() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(HistogramEmbeddings)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": EMBEDDING_MODEL}, {"name": "llama3.2:latest"}]
        })))
        .mount(&server)
        .await;
    server
}

/// Mount a `/api/generate` reply expected exactly `times` times.
pub async fn expect_generation(server: &MockServer, answer: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2",
            "response": answer,
            "done": true,
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Config rooted at `base_dir` that sends embeddings and generation to `server`.
pub fn config_for(server: &MockServer, base_dir: &Path) -> Config {
    let address: &SocketAddr = server.address();
    let mut config = Config {
        base_dir: base_dir.to_path_buf(),
        ..Config::default()
    };
    config.ollama.host = address.ip().to_string();
    config.ollama.port = address.port();
    config.ollama.model = EMBEDDING_MODEL.to_string();
    config.llm.provider = LlmProvider::Ollama;
    config.llm.model = "llama3.2".to_string();
    config.llm.retry_attempts = 1;
    config
}

pub fn write_document(config: &Config, name: &str, content: &str) {
    let dir = config.document_dir();
    std::fs::create_dir_all(&dir).expect("should create document dir");
    std::fs::write(dir.join(name), content).expect("should write document");
}
