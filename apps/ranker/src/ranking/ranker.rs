//! Résumé-to-posting similarity ranking.
//!
//! Algorithm, per run:
//! 1. Embed the résumé once.
//! 2. For each posting, in input order: embed its requirement phrases
//!    (mandatory then desirable) in one batch, score each against the résumé
//!    with cosine similarity, and average the unrounded scores.
//! 3. Sort by overall similarity, descending. The sort is stable, so ties keep
//!    input order.
//!
//! Rounding to 4 decimals happens only when building the output records.
//! Any provider failure aborts the whole run.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::embedding::{embed_texts, EmbeddingError, EmbeddingProvider, EmbeddingVector};
use crate::ranking::posting::JobPosting;
use crate::ranking::similarity::{cosine_similarity, round4};

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Résumé text is empty")]
    EmptyResume,

    #[error("Embedding provider error: {0}")]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRequirement {
    #[serde(rename = "requisito")]
    pub requirement: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPosting {
    #[serde(rename = "codigo")]
    pub code: Value,
    #[serde(rename = "similaridade_geral")]
    pub overall_similarity: f64,
    #[serde(rename = "detalhes")]
    pub details: Vec<ScoredRequirement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingReport {
    pub ranking: Vec<RankedPosting>,
    /// Postings left out because they had no requirement phrases.
    pub skipped: usize,
}

#[derive(Clone)]
pub struct SimilarityRanker {
    provider: Arc<dyn EmbeddingProvider>,
}

impl SimilarityRanker {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub async fn rank(
        &self,
        resume_text: &str,
        postings: &[JobPosting],
    ) -> Result<RankingReport, RankingError> {
        if resume_text.trim().is_empty() {
            return Err(RankingError::EmptyResume);
        }

        info!(
            "Ranking {} postings (model: {})",
            postings.len(),
            self.provider.model()
        );

        let resume_vector = self.embed_resume(resume_text).await?;

        let mut ranking = Vec::new();
        let mut skipped = 0;

        for (idx, posting) in postings.iter().enumerate() {
            let requirements = posting.requirements();

            if requirements.is_empty() {
                info!(
                    "Skipping posting {} ({}): no mandatory or desirable requirements",
                    idx,
                    posting.code_label()
                );
                skipped += 1;
                continue;
            }

            let vectors = embed_texts(self.provider.as_ref(), &requirements).await?;
            let ranked = score_posting(posting, requirements, &vectors, &resume_vector)?;

            debug!(
                "Scored posting {} ({}, {}): {} requirements, overall {}",
                idx,
                posting.code_label(),
                posting.company().unwrap_or("unknown company"),
                ranked.details.len(),
                ranked.overall_similarity
            );
            ranking.push(ranked);
        }

        sort_ranking(&mut ranking);

        info!(
            "Ranking complete: {} ranked, {} skipped",
            ranking.len(),
            skipped
        );

        Ok(RankingReport { ranking, skipped })
    }

    async fn embed_resume(&self, resume_text: &str) -> Result<EmbeddingVector, RankingError> {
        let mut vectors = embed_texts(self.provider.as_ref(), &[resume_text.to_string()]).await?;
        vectors.pop().ok_or(RankingError::Embedding(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        }))
    }
}

/// Scores one posting's requirement vectors against the résumé vector.
/// `vectors` must pair positionally with `requirements`.
fn score_posting(
    posting: &JobPosting,
    requirements: Vec<String>,
    vectors: &[EmbeddingVector],
    resume_vector: &[f64],
) -> Result<RankedPosting, EmbeddingError> {
    if let Some(bad) = vectors.iter().find(|v| v.len() != resume_vector.len()) {
        return Err(EmbeddingError::InvalidDimension {
            expected: resume_vector.len(),
            actual: bad.len(),
        });
    }

    let scores: Vec<f64> = vectors
        .iter()
        .map(|v| cosine_similarity(resume_vector, v))
        .collect();

    let mean = scores.iter().sum::<f64>() / scores.len() as f64;

    let details = requirements
        .into_iter()
        .zip(&scores)
        .map(|(requirement, &score)| ScoredRequirement {
            requirement,
            score: round4(score),
        })
        .collect();

    Ok(RankedPosting {
        code: posting.code.clone(),
        overall_similarity: round4(mean),
        details,
    })
}

/// Descending by overall similarity; stable, so ties keep input order.
fn sort_ranking(ranking: &mut [RankedPosting]) {
    ranking.sort_by(|a, b| b.overall_similarity.total_cmp(&a.overall_similarity));
}
