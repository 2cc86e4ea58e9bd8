use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct NewLink {
    pub trip_id: Uuid,
    pub title: String,
    pub url: String,
}
