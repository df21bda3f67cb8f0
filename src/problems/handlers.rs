use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{CreateProblemRequest, CreatedProblemResponse},
    repo_types::{NewProblem, Problem, ProblemView},
};
use crate::{
    auth::{AuthUser, Role},
    error::{AppError, AppJson},
    state::AppState,
};

const AUTHORS: &[Role] = &[Role::Teacher, Role::Admin];

pub fn problem_routes() -> Router<AppState> {
    Router::new()
        .route("/problems", get(list_problems).post(create_problem))
        .route("/problems/:id", get(get_problem))
}

#[instrument(skip(state, identity, body), fields(user_id = identity.user_id))]
pub async fn create_problem(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    AppJson(body): AppJson<CreateProblemRequest>,
) -> Result<(StatusCode, Json<CreatedProblemResponse>), AppError> {
    identity.require_role(AUTHORS)?;

    let new = NewProblem::try_from(body)?;
    let created = Problem::create(&state.db, identity.user_id, &new).await?;

    info!(
        problem_id = created.id,
        access_code = %created.access_code,
        mode = %new.distractor_mode,
        languages = new.languages.len(),
        "problem created"
    );
    Ok((
        StatusCode::CREATED,
        Json(CreatedProblemResponse {
            message: "Problem created",
            problem_id: created.id,
            access_code: created.access_code,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_problems(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProblemView>>, AppError> {
    Ok(Json(ProblemView::list(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn get_problem(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProblemView>, AppError> {
    ProblemView::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Problem"))
}
