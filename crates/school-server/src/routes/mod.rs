pub mod auth;
pub mod chat;
pub mod schedule;

use axum::Router;
use crate::state::AppState;

pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(auth::routes(state.clone()))
        .merge(schedule::routes(state.clone()))
        .merge(chat::routes(state))
}
