use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use super::LanguageModel;

/// Model for tests: records prompts and answers with a fixed reply.
#[derive(Debug)]
pub(crate) struct RecordingModel {
    reply: Result<String, String>,
    pub(crate) calls: AtomicUsize,
    pub(crate) prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_prompt(&self) -> Option<String> {
        self.prompts
            .lock()
            .expect("prompt log should not be poisoned")
            .last()
            .cloned()
    }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    async fn post_request(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompt log should not be poisoned")
            .push(prompt.to_string());
        self.reply.clone().map_err(|message| anyhow::anyhow!(message))
    }

    fn describe(&self) -> String {
        "recording/test".to_string()
    }
}
