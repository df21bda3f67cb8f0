use axum::{extract::State, routing::post, Json, Router};
use tracing::{instrument, warn};

use super::dto::{SuggestionRequest, SuggestionResponse};
use crate::{
    error::{AppError, AppJson},
    problems::dto::is_supported_language,
    state::AppState,
};

pub fn suggestion_routes() -> Router<AppState> {
    Router::new().route("/ai/suggestion", post(get_suggestion))
}

#[instrument(skip(state, req), fields(problem_id = req.problem_id))]
pub async fn get_suggestion(
    State(state): State<AppState>,
    AppJson(req): AppJson<SuggestionRequest>,
) -> Result<Json<SuggestionResponse>, AppError> {
    if !is_supported_language(&req.language) {
        warn!(language = %req.language, "unsupported suggestion language");
        return Err(AppError::Validation(format!(
            "Unsupported language {}",
            req.language
        )));
    }

    let suggestion = state
        .suggestions
        .suggest(&req.current_code, &req.problem_prompt, &req.language)
        .await
        .map_err(AppError::Upstream)?;
    Ok(Json(suggestion.into()))
}
