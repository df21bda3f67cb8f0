use crate::state::AppState;
use axum::Router;

pub mod claims;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
mod repo;
pub mod repo_types;

pub use claims::{Identity, Role};
pub use extractors::{AuthError, AuthUser};
pub use jwt::{JwtKeys, TokenError};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
