// Question answering over the indexed documents: retrieve, classify, prompt,
// generate.

pub mod intent;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;

pub use intent::{Intent, IntentClassifier, KeywordIntentClassifier, PromptTemplate};
pub use orchestrator::{ConversationState, Orchestrator, Stage};
pub use prompt::{NO_CONTEXT_ANSWER, PromptBuilder, PromptPlan};
pub use retriever::Retriever;
