// Scouting chatbot front half: query understanding, retrieval context,
// conversation memory and prompt construction. The document store and the
// text-completion service are supplied by the caller.

pub mod intent;
pub mod memory;
pub mod prompt;
pub mod retrieval;
pub mod session;

pub use intent::{classify_intent, ProcessedQuery, QueryEntities, QueryIntent, QueryParser};
pub use memory::{ChatMemory, ChatMessage, Role};
pub use prompt::{build_messages, build_prompt, system_prompt, TextCompletion};
pub use retrieval::{ContextBuilder, DocumentStore, RetrievalContext, SearchHits, SearchRequest};
pub use session::{ChatResponse, ChatSession, Visualization};

/// Failures from the external collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("document store error: {0}")]
    Store(String),

    #[error("completion service error: {0}")]
    Completion(String),
}
