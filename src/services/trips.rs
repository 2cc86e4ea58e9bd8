use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Activity, Link, NewActivity, NewLink, NewTrip, Participant, Trip, TripUpdate},
    validation::{self, parse_id, required_text},
};

use super::{notifier::Notifier, storage::TripStore};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripInput {
    pub destination: String,
    pub owner_name: String,
    pub owner_email: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub emails_to_invite: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTripInput {
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityInput {
    pub title: String,
    pub occurs_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLinkInput {
    pub title: String,
    pub url: String,
}

/// Trip lifecycle operations. Holds no trip state of its own: every call
/// goes back to the store.
#[derive(Clone)]
pub struct TripService {
    pub(super) store: Arc<dyn TripStore>,
    pub(super) notifier: Notifier,
    store_timeout: Duration,
}

impl TripService {
    pub fn new(store: Arc<dyn TripStore>, notifier: Notifier, store_timeout: Duration) -> Self {
        Self {
            store,
            notifier,
            store_timeout,
        }
    }

    #[instrument(skip_all, fields(destination = %input.destination))]
    pub async fn create_trip(&self, input: CreateTripInput) -> Result<Uuid, AppError> {
        let trip = NewTrip {
            destination: required_text(&input.destination, "destination")?,
            owner_name: required_text(&input.owner_name, "owner_name")?,
            owner_email: validation::email(&input.owner_email, "owner_email")?,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            emails_to_invite: validation::emails(&input.emails_to_invite, "emails_to_invite")?,
        };
        validation::date_range(trip.starts_at, trip.ends_at)?;

        // The store bounds its own staging and never times out a commit.
        let trip_id = self.logged("create_trip", self.store.create_trip(trip)).await?;
        info!(%trip_id, "trip created");

        self.notifier.dispatch_trip_created(trip_id);
        Ok(trip_id)
    }

    #[instrument(skip(self))]
    pub async fn get_trip(&self, trip_id: &str) -> Result<Trip, AppError> {
        let id = parse_id(trip_id, "trip")?;
        self.require_trip(id, trip_id).await
    }

    /// Overwrites destination and dates. The confirmed flag is carried over
    /// from the stored record, so an update never un-confirms a trip.
    #[instrument(skip(self, input))]
    pub async fn update_trip(&self, trip_id: &str, input: UpdateTripInput) -> Result<(), AppError> {
        let id = parse_id(trip_id, "trip")?;
        let destination = required_text(&input.destination, "destination")?;
        validation::date_range(input.starts_at, input.ends_at)?;

        let current = self.require_trip(id, trip_id).await?;
        let update = TripUpdate {
            id,
            destination,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            is_confirmed: current.is_confirmed,
        };
        self.run("update_trip", self.store.update_trip(update)).await
    }

    #[instrument(skip(self))]
    pub async fn get_participants(&self, trip_id: &str) -> Result<Vec<Participant>, AppError> {
        let id = parse_id(trip_id, "trip")?;
        self.run("get_participants", self.store.get_participants(id))
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_trip_activities(&self, trip_id: &str) -> Result<Vec<Activity>, AppError> {
        let id = parse_id(trip_id, "trip")?;
        self.run("get_trip_activities", self.store.get_trip_activities(id))
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_trip_links(&self, trip_id: &str) -> Result<Vec<Link>, AppError> {
        let id = parse_id(trip_id, "trip")?;
        self.run("get_trip_links", self.store.get_trip_links(id))
            .await
    }

    #[instrument(skip(self, input))]
    pub async fn create_activity(
        &self,
        trip_id: &str,
        input: CreateActivityInput,
    ) -> Result<Uuid, AppError> {
        let activity = NewActivity {
            trip_id: parse_id(trip_id, "trip")?,
            title: required_text(&input.title, "title")?,
            occurs_at: input.occurs_at,
        };
        self.run("create_activity", self.store.create_activity(activity))
            .await
    }

    #[instrument(skip(self, input))]
    pub async fn create_trip_link(
        &self,
        trip_id: &str,
        input: CreateLinkInput,
    ) -> Result<Uuid, AppError> {
        let link = NewLink {
            trip_id: parse_id(trip_id, "trip")?,
            title: required_text(&input.title, "title")?,
            url: validation::url(&input.url)?,
        };
        self.run("create_trip_link", self.store.create_trip_link(link))
            .await
    }

    /// Appends participants as one batch. Separate calls for the same trip
    /// are not serialized against each other.
    #[instrument(skip(self, emails))]
    pub async fn invite_participants_to_trip(
        &self,
        trip_id: &str,
        emails: &[String],
    ) -> Result<Vec<Uuid>, AppError> {
        let id = parse_id(trip_id, "trip")?;
        if emails.is_empty() {
            return Err(AppError::Validation("at least one email is required".into()));
        }
        let emails = validation::emails(emails, "emails")?;
        self.logged(
            "invite_participants_to_trip",
            self.store.invite_participants_to_trip(id, &emails),
        )
        .await
    }

    pub(super) async fn require_trip(&self, id: Uuid, raw_id: &str) -> Result<Trip, AppError> {
        self.run("get_trip", self.store.get_trip(id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("trip {raw_id} not found")))
    }

    /// Bounds a single-statement store call by the configured deadline and
    /// logs operational failures. Dropping the inner future releases its
    /// connection.
    pub(super) async fn run<T, F>(&self, operation: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let bounded = async {
            tokio::time::timeout(self.store_timeout, call)
                .await
                .unwrap_or(Err(AppError::Timeout))
        };
        self.logged(operation, bounded).await
    }

    /// Logs operational failures of a store call that enforces its own
    /// deadline.
    async fn logged<T, F>(&self, operation: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let outcome = call.await;
        if let Err(err) = &outcome {
            if !err.is_client_error() {
                error!(operation, error = %err, "store operation failed");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::test_support::{
        trip_service, FailingTransport, HangingTransport, RecordingTransport, TestDb,
    };

    fn rio_trip(invites: &[&str]) -> CreateTripInput {
        CreateTripInput {
            destination: "Rio de Janeiro".into(),
            owner_name: "Ana".into(),
            owner_email: "ana@example.com".into(),
            starts_at: Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2024, 7, 8, 10, 0, 0).unwrap(),
            emails_to_invite: invites.iter().map(|e| e.to_string()).collect(),
        }
    }

    async fn trip_count(db: &TestDb) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM trips")
            .fetch_one(&db.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_trip_invites_and_notifies_owner() {
        let db = TestDb::new().await;
        let (transport, mut sent) = RecordingTransport::new();
        let service = trip_service(&db.pool, Arc::new(transport));

        let id = service
            .create_trip(rio_trip(&["bia@example.com", "caio@example.com"]))
            .await
            .unwrap();

        let participants = service.get_participants(&id.to_string()).await.unwrap();
        assert_eq!(participants.len(), 2);
        assert!(participants.iter().all(|p| !p.is_confirmed));

        let mail = tokio::time::timeout(Duration::from_secs(5), sent.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mail.to.email.to_string(), "ana@example.com");
    }

    #[tokio::test]
    async fn mail_failure_does_not_fail_creation() {
        let db = TestDb::new().await;
        let service = trip_service(&db.pool, Arc::new(FailingTransport));

        let id = service.create_trip(rio_trip(&[])).await.unwrap();

        let trip = service.get_trip(&id.to_string()).await.unwrap();
        assert_eq!(trip.destination, "Rio de Janeiro");
    }

    #[tokio::test]
    async fn stalled_mail_server_does_not_slow_down_requests() {
        let db = TestDb::new().await;
        let service = trip_service(&db.pool, Arc::new(HangingTransport));
        let bound = Duration::from_secs(1);

        let id = tokio::time::timeout(bound, service.create_trip(rio_trip(&["bia@example.com"])))
            .await
            .expect("create_trip waited on the mail server")
            .unwrap()
            .to_string();
        let trip = tokio::time::timeout(bound, service.confirm_trip(&id))
            .await
            .expect("confirm_trip waited on the mail server")
            .unwrap();

        assert!(trip.is_confirmed);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_the_store() {
        let db = TestDb::new().await;
        let (transport, _sent) = RecordingTransport::new();
        let service = trip_service(&db.pool, Arc::new(transport));

        let mut blank = rio_trip(&[]);
        blank.destination = "  ".into();
        let mut bad_owner = rio_trip(&[]);
        bad_owner.owner_email = "ana".into();
        let bad_invite = rio_trip(&["bia@example.com", "not-an-email"]);
        let mut backwards = rio_trip(&[]);
        std::mem::swap(&mut backwards.starts_at, &mut backwards.ends_at);

        for input in [blank, bad_owner, bad_invite, backwards] {
            let err = service.create_trip(input).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{err:?}");
        }
        assert_eq!(trip_count(&db).await, 0);
    }

    #[tokio::test]
    async fn update_overwrites_fields_and_keeps_confirmation() {
        let db = TestDb::new().await;
        let service = trip_service(&db.pool, Arc::new(FailingTransport));
        let id = service.create_trip(rio_trip(&[])).await.unwrap().to_string();
        service.confirm_trip(&id).await.unwrap();

        let starts_at = Utc.with_ymd_and_hms(2024, 8, 1, 10, 0, 0).unwrap();
        let ends_at = Utc.with_ymd_and_hms(2024, 8, 3, 10, 0, 0).unwrap();
        service
            .update_trip(
                &id,
                UpdateTripInput {
                    destination: "Recife".into(),
                    starts_at,
                    ends_at,
                },
            )
            .await
            .unwrap();

        let trip = service.get_trip(&id).await.unwrap();
        assert_eq!(trip.destination, "Recife");
        assert_eq!(trip.starts_at, starts_at);
        assert_eq!(trip.ends_at, ends_at);
        assert_eq!(trip.owner_email, "ana@example.com");
        assert!(trip.is_confirmed);
    }

    #[tokio::test]
    async fn unknown_and_malformed_trip_ids() {
        let db = TestDb::new().await;
        let service = trip_service(&db.pool, Arc::new(FailingTransport));

        let missing = Uuid::new_v4().to_string();
        assert!(matches!(
            service.get_trip(&missing).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.get_trip("abc").await,
            Err(AppError::Validation(_))
        ));
        let update = UpdateTripInput {
            destination: "Recife".into(),
            starts_at: Utc::now(),
            ends_at: Utc::now(),
        };
        assert!(matches!(
            service.update_trip(&missing, update).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn empty_collections_are_not_errors() {
        let db = TestDb::new().await;
        let service = trip_service(&db.pool, Arc::new(FailingTransport));
        let id = service.create_trip(rio_trip(&[])).await.unwrap().to_string();

        assert!(service.get_participants(&id).await.unwrap().is_empty());
        assert!(service.get_trip_activities(&id).await.unwrap().is_empty());
        assert!(service.get_trip_links(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn activities_and_links_attach_to_existing_trips_only() {
        let db = TestDb::new().await;
        let service = trip_service(&db.pool, Arc::new(FailingTransport));
        let id = service.create_trip(rio_trip(&[])).await.unwrap().to_string();

        let activity_id = service
            .create_activity(
                &id,
                CreateActivityInput {
                    title: "Sugarloaf".into(),
                    occurs_at: Utc.with_ymd_and_hms(2024, 7, 2, 9, 0, 0).unwrap(),
                },
            )
            .await
            .unwrap();
        let link_id = service
            .create_trip_link(
                &id,
                CreateLinkInput {
                    title: "Hotel".into(),
                    url: "https://example.com/booking".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(service.get_trip_activities(&id).await.unwrap()[0].id, activity_id);
        assert_eq!(service.get_trip_links(&id).await.unwrap()[0].id, link_id);

        let orphan = service
            .create_activity(
                &Uuid::new_v4().to_string(),
                CreateActivityInput {
                    title: "Nowhere".into(),
                    occurs_at: Utc::now(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(orphan, AppError::NotFound(_)));

        let bad_url = service
            .create_trip_link(
                &id,
                CreateLinkInput {
                    title: "Hotel".into(),
                    url: "booking".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(bad_url, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn invites_append_to_an_existing_trip() {
        let db = TestDb::new().await;
        let service = trip_service(&db.pool, Arc::new(FailingTransport));
        let id = service
            .create_trip(rio_trip(&["bia@example.com"]))
            .await
            .unwrap()
            .to_string();

        let added = service
            .invite_participants_to_trip(&id, &["caio@example.com".to_string()])
            .await
            .unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(service.get_participants(&id).await.unwrap().len(), 2);

        assert!(matches!(
            service.invite_participants_to_trip(&id, &[]).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service
                .invite_participants_to_trip(&id, &["bia@example.com".to_string()])
                .await,
            Err(AppError::Conflict(_))
        ));
    }
}
