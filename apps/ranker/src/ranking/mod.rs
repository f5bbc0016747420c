// Résumé-to-posting similarity ranking.
// All embedding calls go through the injected EmbeddingProvider; nothing here
// talks to a provider API directly.

pub mod handlers;
pub mod posting;
pub mod ranker;
pub mod similarity;
