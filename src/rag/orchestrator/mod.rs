
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::intent::{IntentClassifier, KeywordIntentClassifier};
use super::prompt::{PromptBuilder, PromptPlan};
use super::retriever::Retriever;
use crate::config::Config;
use crate::embeddings::Chunk;
use crate::indexer::Indexer;
use crate::llm::LanguageModel;
use crate::{RagError, Result};

/// Where a question is in the answering pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Received,
    Retrieved,
    Answered,
}

/// A question travelling through the pipeline. Serialized as the `/ask`
/// response body.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationState {
    pub question: String,
    pub context: Vec<Chunk>,
    pub answer: String,
    #[serde(skip)]
    pub stage: Stage,
}

impl ConversationState {
    #[inline]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: Vec::new(),
            answer: String::new(),
            stage: Stage::Received,
        }
    }
}

/// Drives a question from `Received` to `Answered`.
pub struct Orchestrator {
    indexer: Arc<Indexer>,
    retriever: Retriever,
    classifier: Arc<dyn IntentClassifier>,
    prompts: PromptBuilder,
    llm: Arc<dyn LanguageModel>,
}

impl std::fmt::Debug for Orchestrator {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("indexer", &self.indexer)
            .field("retriever", &self.retriever)
            .field("llm", &self.llm.describe())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[inline]
    pub fn new(
        indexer: Arc<Indexer>,
        retriever: Retriever,
        classifier: Arc<dyn IntentClassifier>,
        prompts: PromptBuilder,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            indexer,
            retriever,
            classifier,
            prompts,
            llm,
        }
    }

    /// Wire up the keyword classifier and prompt templates from `config`.
    #[inline]
    pub fn from_config(
        config: &Config,
        indexer: Arc<Indexer>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        Self::new(
            indexer,
            Retriever::from_config(&config.retrieval),
            Arc::new(KeywordIntentClassifier::new(&config.intent)),
            PromptBuilder::new(config.prompt.clone()),
            llm,
        )
    }

    #[inline]
    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    /// Answer `question` from the active index.
    #[inline]
    pub async fn ask(&self, question: &str) -> Result<ConversationState> {
        let state = ConversationState::new(question);
        let state = self.retrieve(state).await?;
        self.generate(state).await
    }

    /// `Received` to `Retrieved`.
    #[inline]
    pub async fn retrieve(&self, mut state: ConversationState) -> Result<ConversationState> {
        let index = self.indexer.current().await;
        let retriever = self.retriever;
        let question = state.question.clone();

        state.context = tokio::task::spawn_blocking(move || {
            retriever.retrieve(index.as_deref(), &question)
        })
        .await
        .map_err(|e| RagError::Other(anyhow::anyhow!("Retrieval task failed: {}", e)))??;

        state.stage = Stage::Retrieved;
        debug!("Retrieved {} context chunks", state.context.len());
        Ok(state)
    }

    /// `Retrieved` to `Answered`. Empty context is answered locally.
    #[inline]
    pub async fn generate(&self, mut state: ConversationState) -> Result<ConversationState> {
        let intent = self.classifier.classify(&state.question);

        state.answer = match self.prompts.build(&state.question, &state.context, intent) {
            PromptPlan::Fallback(answer) => {
                info!("No context for question, answering with fallback");
                answer
            }
            PromptPlan::Prompt { template, text } => {
                info!(
                    "Generating answer with {:?} template via {}",
                    template,
                    self.llm.describe()
                );
                self.llm
                    .post_request(&text)
                    .await
                    .map_err(|e| RagError::Llm(format!("{:#}", e)))?
            }
        };

        state.stage = Stage::Answered;
        Ok(state)
    }
}
