use crate::ranking::ranker::SimilarityRanker;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Holds the embedding provider chosen at startup (EMBEDDING_PROVIDER).
    pub ranker: SimilarityRanker,
}
