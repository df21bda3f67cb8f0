use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::auth::{AuthError, TokenError};

/// Request-scoped failure, rendered as `{"detail": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid role")]
    InvalidRole,

    /// Login failure. Unknown email and wrong password are deliberately the same.
    #[error("Invalid email or password")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    /// Body was not JSON or did not fit the request type.
    #[error("{}", .0.body_text())]
    Body(#[from] JsonRejection),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Suggestion service unavailable")]
    Upstream(#[source] anyhow::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(AuthError::Forbidden) => StatusCode::FORBIDDEN,
            AppError::Auth(_) | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::InvalidRole | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Body(r) => r.status(),
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `Json<T>` whose rejections go through [`AppError`], so a bad body still
/// answers with a `detail` object.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Auth(AuthError::InvalidCredential(e))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            AppError::Upstream(e) => {
                error!(error = %e, "suggestion service failed");
                self.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_expected_statuses() {
        assert_eq!(
            AppError::from(AuthError::MissingCredential).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(TokenError::Expired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(AuthError::Forbidden).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn expired_and_malformed_read_differently() {
        let expired = AppError::from(TokenError::Expired).to_string();
        let malformed = AppError::from(TokenError::Malformed).to_string();
        assert_ne!(expired, malformed);
        assert!(expired.contains("log in again"));
    }

    #[tokio::test]
    async fn json_body_rejection_renders_detail() {
        use axum::{body::Body, http::Request};
        use http_body_util::BodyExt;

        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Payload {
            email: String,
            password: String,
        }

        let req = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"email":"a@x.com"}"#))
            .unwrap();
        let err = AppJson::<Payload>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            resp.headers()["content-type"].to_str().unwrap(),
            "application/json"
        );
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("password"));
    }

    #[test]
    fn internal_error_hides_cause() {
        let resp = AppError::Internal(anyhow::anyhow!("db exploded")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
