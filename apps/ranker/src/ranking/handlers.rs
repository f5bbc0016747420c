//! Axum route handlers for the Ranking API.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::ranking::posting::parse_postings;
use crate::ranking::ranker::RankingReport;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RankRequest {
    pub resume_text: String,
    /// A list of posting analyses, or a single one.
    pub postings: Value,
}

/// POST /api/v1/ranking
///
/// Scores the résumé against every posting's requirements and returns the
/// postings ordered by overall similarity. Postings without requirements are
/// left out and counted in `skipped`.
pub async fn handle_rank(
    State(state): State<AppState>,
    Json(request): Json<RankRequest>,
) -> Result<Json<RankingReport>, AppError> {
    let postings = parse_postings(&request.postings)?;
    let report = state.ranker.rank(&request.resume_text, &postings).await?;

    Ok(Json(report))
}
