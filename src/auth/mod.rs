use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod provider;
pub mod services;
pub(crate) mod extractors;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
