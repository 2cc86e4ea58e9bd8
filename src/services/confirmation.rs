//! One-way confirmation of participants and trips.
//!
//! Participants are guarded: confirming twice is a conflict. Trips are not:
//! confirming writes the full record with `is_confirmed = true` every time,
//! so repeated calls succeed and each one schedules an owner email.

use tracing::{info, instrument};

use crate::{
    error::AppError,
    models::{Participant, Trip, TripUpdate},
    validation::parse_id,
};

use super::trips::TripService;

impl TripService {
    #[instrument(skip(self))]
    pub async fn confirm_participant(&self, participant_id: &str) -> Result<Participant, AppError> {
        let id = parse_id(participant_id, "participant")?;
        let mut participant = self
            .run("get_participant", self.store.get_participant(id))
            .await?
            .ok_or_else(|| AppError::NotFound("participant not found".into()))?;

        if participant.is_confirmed {
            return Err(AppError::Conflict("participant already confirmed".into()));
        }

        // Two racing calls can both get here; setting the flag twice is harmless.
        self.run("confirm_participant", self.store.confirm_participant(id))
            .await?;
        participant.is_confirmed = true;
        info!(trip_id = %participant.trip_id, "participant confirmed");
        Ok(participant)
    }

    #[instrument(skip(self))]
    pub async fn confirm_trip(&self, trip_id: &str) -> Result<Trip, AppError> {
        let id = parse_id(trip_id, "trip")?;
        let trip = self.require_trip(id, trip_id).await?;

        self.run("update_trip", self.store.update_trip(TripUpdate::confirming(&trip)))
            .await?;
        let confirmed = Trip {
            is_confirmed: true,
            ..trip
        };
        info!(destination = %confirmed.destination, "trip confirmed");

        self.notifier.dispatch_trip_confirmed(confirmed.clone());
        Ok(confirmed)
    }
}
