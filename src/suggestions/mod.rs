mod dto;
pub mod handlers;
pub mod service;

use crate::state::AppState;
use axum::Router;

pub use service::{OpenAiSuggester, Suggestion, SuggestionService};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::suggestion_routes())
}
