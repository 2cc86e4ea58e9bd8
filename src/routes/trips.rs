use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Activity, Link, Participant, Trip},
    services::trips::{CreateActivityInput, CreateLinkInput, CreateTripInput, UpdateTripInput},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_trip))
        .route("/:trip_id", get(get_trip).put(update_trip))
        .route("/:trip_id/confirm", get(confirm_trip))
        .route(
            "/:trip_id/activities",
            get(list_activities).post(create_activity),
        )
        .route("/:trip_id/invites", post(invite))
        .route("/:trip_id/links", get(list_links).post(create_link))
        .route("/:trip_id/participants", get(list_participants))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TripView {
    id: Uuid,
    destination: String,
    owner_name: String,
    owner_email: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    is_confirmed: bool,
}

impl From<Trip> for TripView {
    fn from(trip: Trip) -> Self {
        Self {
            id: trip.id,
            destination: trip.destination,
            owner_name: trip.owner_name,
            owner_email: trip.owner_email,
            starts_at: trip.starts_at,
            ends_at: trip.ends_at,
            is_confirmed: trip.is_confirmed,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantView {
    id: Uuid,
    name: Option<String>,
    email: String,
    is_confirmed: bool,
}

impl From<Participant> for ParticipantView {
    fn from(participant: Participant) -> Self {
        Self {
            id: participant.id,
            name: participant.name,
            email: participant.email,
            is_confirmed: participant.is_confirmed,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivityView {
    id: Uuid,
    title: String,
    occurs_at: DateTime<Utc>,
}

impl From<Activity> for ActivityView {
    fn from(activity: Activity) -> Self {
        Self {
            id: activity.id,
            title: activity.title,
            occurs_at: activity.occurs_at,
        }
    }
}

#[derive(Serialize)]
struct LinkView {
    id: Uuid,
    title: String,
    url: String,
}

impl From<Link> for LinkView {
    fn from(link: Link) -> Self {
        Self {
            id: link.id,
            title: link.title,
            url: link.url,
        }
    }
}

#[derive(Deserialize)]
struct InviteForm {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    emails: Vec<String>,
}

impl InviteForm {
    fn into_emails(self) -> Vec<String> {
        let mut emails = self.emails;
        emails.extend(self.email);
        emails
    }
}

async fn create_trip(
    State(state): State<AppState>,
    Json(input): Json<CreateTripInput>,
) -> Result<impl IntoResponse, AppError> {
    let trip_id = state.trips.create_trip(input).await?;
    Ok((StatusCode::CREATED, Json(json!({ "tripId": trip_id }))))
}

async fn get_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let trip = state.trips.get_trip(&trip_id).await?;
    Ok(Json(json!({ "trip": TripView::from(trip) })))
}

async fn update_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Json(input): Json<UpdateTripInput>,
) -> Result<StatusCode, AppError> {
    state.trips.update_trip(&trip_id, input).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn confirm_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.trips.confirm_trip(&trip_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_activities(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let activities: Vec<ActivityView> = state
        .trips
        .get_trip_activities(&trip_id)
        .await?
        .into_iter()
        .map(ActivityView::from)
        .collect();
    Ok(Json(json!({ "activities": activities })))
}

async fn create_activity(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Json(input): Json<CreateActivityInput>,
) -> Result<impl IntoResponse, AppError> {
    let activity_id = state.trips.create_activity(&trip_id, input).await?;
    Ok((StatusCode::CREATED, Json(json!({ "activityId": activity_id }))))
}

async fn invite(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Json(form): Json<InviteForm>,
) -> Result<impl IntoResponse, AppError> {
    let participant_ids = state
        .trips
        .invite_participants_to_trip(&trip_id, &form.into_emails())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "participantIds": participant_ids })),
    ))
}

async fn list_links(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let links: Vec<LinkView> = state
        .trips
        .get_trip_links(&trip_id)
        .await?
        .into_iter()
        .map(LinkView::from)
        .collect();
    Ok(Json(json!({ "links": links })))
}

async fn create_link(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Json(input): Json<CreateLinkInput>,
) -> Result<impl IntoResponse, AppError> {
    let link_id = state.trips.create_trip_link(&trip_id, input).await?;
    Ok((StatusCode::CREATED, Json(json!({ "linkId": link_id }))))
}

async fn list_participants(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let participants: Vec<ParticipantView> = state
        .trips
        .get_participants(&trip_id)
        .await?
        .into_iter()
        .map(ParticipantView::from)
        .collect();
    Ok(Json(json!({ "participants": participants })))
}
