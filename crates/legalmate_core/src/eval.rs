use crate::embed::EmbeddingProvider;
use crate::index::CorpusIndex;
use crate::model::RoutingDecision;
use crate::retrieval::match_query;
use crate::router::ResponseRouter;
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const DEFAULT_REQUIRED_PASS_RATE: f32 = 0.85;

/// A labelled query used to check retrieval and routing without calling the
/// generative model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    pub case_id: String,
    pub question: String,
    pub expected_route: RoutingDecision,
    #[serde(default)]
    pub expected_entry: Option<usize>,
    #[serde(default)]
    pub min_similarity: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalOutcome {
    pub case_id: String,
    pub passed: bool,
    pub actual_route: RoutingDecision,
    pub actual_entry: Option<usize>,
    pub score: Option<f32>,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f32,
    pub outcomes: Vec<EvalOutcome>,
}

impl EvalSummary {
    pub fn meets(&self, required_pass_rate: f32) -> bool {
        self.pass_rate >= required_pass_rate
    }
}

fn case_passed(case: &EvalCase, route: RoutingDecision, entry: Option<usize>, score: Option<f32>) -> bool {
    if case.expected_route != route {
        return false;
    }
    if case.expected_entry.is_some() && case.expected_entry != entry {
        return false;
    }
    match case.min_similarity {
        Some(min) => score.is_some_and(|s| s >= min),
        None => true,
    }
}

pub fn evaluate_cases<E>(
    embedder: &E,
    index: &CorpusIndex,
    router: &ResponseRouter,
    cases: &[EvalCase],
) -> anyhow::Result<EvalSummary>
where
    E: EmbeddingProvider + ?Sized,
{
    let mut outcomes = Vec::with_capacity(cases.len());

    for case in cases {
        let start = Instant::now();
        let query = embedder.embed(&case.question)?;
        let matched = match_query(&query, index).ok();
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let route = matched
            .map(|m| router.decide(m.score))
            .unwrap_or(RoutingDecision::FromFallback);
        // the entry only counts when it would actually be served
        let entry = matched
            .filter(|_| route == RoutingDecision::FromCorpus)
            .map(|m| m.entry_index);
        let score = matched.map(|m| m.score);

        outcomes.push(EvalOutcome {
            case_id: case.case_id.clone(),
            passed: case_passed(case, route, entry, score),
            actual_route: route,
            actual_entry: entry,
            score,
            latency_ms,
        });
    }

    let total = outcomes.len();
    let passed = outcomes.iter().filter(|o| o.passed).count();
    let pass_rate = if total == 0 {
        0.0
    } else {
        passed as f32 / total as f32
    };

    Ok(EvalSummary {
        total,
        passed,
        failed: total - passed,
        pass_rate,
        outcomes,
    })
}
