pub mod assistant;
pub mod config;
pub mod embed;
pub mod eval;
pub mod fallback;
pub mod index;
pub mod minilm_embed;
pub mod model;
pub mod retrieval;
pub mod router;
pub mod session;
pub mod storage;

pub use assistant::{format_corpus_reply, LegalAssistant, LEGAL_INFO_DISCLAIMER};
pub use config::{
    ConfigError, FallbackConfig, DEFAULT_CHAT_MODEL, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS,
};
pub use embed::{EmbeddingProvider, HashEmbeddingProvider, DEFAULT_HASH_DIM};
pub use eval::{evaluate_cases, EvalCase, EvalOutcome, EvalSummary, DEFAULT_REQUIRED_PASS_RATE};
pub use fallback::{
    ChatMessage, ChatRequest, ChatRole, ChatTransport, FallbackError, FallbackReply,
    GenerativeFallbackClient, OpenAiTransport, FALLBACK_DISCLAIMER, GENERIC_APOLOGY,
    RATE_LIMIT_APOLOGY, SYSTEM_PROMPT,
};
pub use index::{CorpusIndex, IndexError};
pub use minilm_embed::MiniLmEmbeddingProvider;
pub use model::{
    ConversationTurn, FallbackOutcome, FaqEntry, MatchResult, Reply, Role, Route,
    RoutingDecision,
};
pub use retrieval::{cosine_similarity, match_query, top_k, MatchError};
pub use router::{ResponseRouter, DEFAULT_THRESHOLD};
pub use session::ConversationSession;
pub use storage::{load_corpus, validate_entries, CorpusError};
