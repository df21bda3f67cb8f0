use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        claims::Role,
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_account},
        repo_types::User,
    },
    error::{AppError, AppJson},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(get_me))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let role: Role = payload.role.parse().map_err(|_| {
        warn!(role = %payload.role, "invalid role");
        AppError::InvalidRole
    })?;

    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!("invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password is required".into()));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!("email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let hash = hash_password(&payload.password)?;

    let user = match User::create(&state.db, &payload.name, &payload.email, &hash, role).await {
        Ok(u) => u,
        // Lost a race with a concurrent registration.
        Err(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => {
            warn!("email already registered");
            return Err(AppError::DuplicateEmail);
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(e.into());
        }
    };

    let token = JwtKeys::from_ref(&state).issue(user.id, &user.email, user.role)?;

    info!(user_id = user.id, role = %user.role, "user registered");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = User::find_by_email(&state.db, &payload.email).await?;
    let matched = verify_account(
        &payload.password,
        user.as_ref().map(|u| u.password_hash.as_str()),
    );

    let user = match user {
        Some(u) if matched => u,
        Some(u) => {
            warn!(user_id = u.id, "login invalid password");
            return Err(AppError::Unauthorized);
        }
        None => {
            warn!("login unknown email");
            return Err(AppError::Unauthorized);
        }
    };

    let token = JwtKeys::from_ref(&state).issue(user.id, &user.email, user.role)?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state, identity), fields(user_id = identity.user_id))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = User::find_by_id(&state.db, identity.user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    Ok(Json(user.into()))
}
