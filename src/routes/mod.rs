pub mod participants;
pub mod trips;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/trips", trips::router())
        .nest("/participants", participants::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
