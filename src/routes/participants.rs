use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::patch,
    Router,
};

use crate::{error::AppError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/:participant_id/confirm", patch(confirm_participant))
}

async fn confirm_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.trips.confirm_participant(&participant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
