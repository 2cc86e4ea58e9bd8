use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub destination: String,
    pub owner_name: String,
    pub owner_email: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_confirmed: bool,
}

/// Everything needed to persist a trip together with its initial invites.
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub destination: String,
    pub owner_name: String,
    pub owner_email: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub emails_to_invite: Vec<String>,
}

/// Full-record write; every column except the owner is overwritten.
#[derive(Debug, Clone)]
pub struct TripUpdate {
    pub id: Uuid,
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_confirmed: bool,
}

impl TripUpdate {
    pub fn confirming(trip: &Trip) -> Self {
        Self {
            id: trip.id,
            destination: trip.destination.clone(),
            starts_at: trip.starts_at,
            ends_at: trip.ends_at,
            is_confirmed: true,
        }
    }
}
