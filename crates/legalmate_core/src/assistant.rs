use crate::embed::EmbeddingProvider;
use crate::fallback::GenerativeFallbackClient;
use crate::index::CorpusIndex;
use crate::model::{ConversationTurn, FaqEntry, MatchResult, Reply, Route, RoutingDecision};
use crate::retrieval::match_query;
use crate::router::ResponseRouter;
use crate::session::ConversationSession;
use std::sync::Arc;
use tracing::{info, warn};

pub const LEGAL_INFO_DISCLAIMER: &str =
    "This chatbot provides general legal information only and does not constitute legal advice.";

pub fn format_corpus_reply(entry: &FaqEntry) -> String {
    format!("{}\n\nSource: {}", entry.answer.trim_end(), entry.source)
}

/// Routes each query to the FAQ corpus or the generative fallback and records
/// the exchange in the caller's session.
pub struct LegalAssistant<E> {
    index: Arc<CorpusIndex>,
    embedder: E,
    router: ResponseRouter,
    fallback: GenerativeFallbackClient,
}

impl<E: EmbeddingProvider> LegalAssistant<E> {
    pub fn new(
        index: Arc<CorpusIndex>,
        embedder: E,
        router: ResponseRouter,
        fallback: GenerativeFallbackClient,
    ) -> Self {
        Self {
            index,
            embedder,
            router,
            fallback,
        }
    }

    /// Best corpus match for `query`, or `None` when the corpus is empty or
    /// the query cannot be embedded.
    pub fn lookup(&self, query: &str) -> Option<MatchResult> {
        let vector = match self.embedder.embed(query) {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "query embedding failed, routing to fallback");
                return None;
            }
        };

        match match_query(&vector, &self.index) {
            Ok(m) => Some(m),
            Err(err) => {
                warn!(error = %err, "no corpus match possible, routing to fallback");
                None
            }
        }
    }

    /// Answer one query. Appends the user turn and the reply to `session`;
    /// never fails.
    pub fn ask(&self, session: &mut ConversationSession, query: &str) -> Reply {
        session.append(ConversationTurn::user(query));

        let matched = self.lookup(query);
        let corpus_hit = matched
            .filter(|m| self.router.decide(m.score) == RoutingDecision::FromCorpus)
            .and_then(|m| self.index.entry(m.entry_index).map(|entry| (m, entry)));

        let reply = match corpus_hit {
            Some((m, entry)) => Reply {
                content: format_corpus_reply(entry),
                route: Route::Corpus {
                    entry_index: m.entry_index,
                    score: m.score,
                },
            },
            None => {
                let answer = self.fallback.answer(query);
                Reply {
                    content: answer.content,
                    route: Route::Fallback {
                        score: matched.map(|m| m.score),
                        outcome: answer.outcome,
                    },
                }
            }
        };

        info!(
            decision = ?reply.route.decision(),
            score = ?reply.route.score(),
            entry_index = ?reply.route.entry_index(),
            threshold = self.router.threshold(),
            "routed query"
        );

        session.append(ConversationTurn::assistant(reply.content.clone()));
        reply
    }
}
