use std::{future::Future, time::Duration};

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{Activity, Link, NewActivity, NewLink, NewTrip, Participant, Trip, TripUpdate},
};

/// Durable storage for trips and everything hanging off them.
///
/// Lookups return `Ok(None)` for unknown ids; deciding whether that is an
/// error belongs to the caller. Writes against an unknown owning trip fail
/// with [`AppError::NotFound`].
///
/// Multi-statement writes bound their own staging phase and commit outside
/// that deadline, so a reported timeout always means nothing was written.
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Inserts the trip and one participant per invite email as a unit.
    async fn create_trip(&self, trip: NewTrip) -> Result<Uuid, AppError>;
    async fn get_trip(&self, trip_id: Uuid) -> Result<Option<Trip>, AppError>;
    async fn update_trip(&self, update: TripUpdate) -> Result<(), AppError>;
    async fn get_participant(&self, participant_id: Uuid)
        -> Result<Option<Participant>, AppError>;
    async fn get_participants(&self, trip_id: Uuid) -> Result<Vec<Participant>, AppError>;
    async fn confirm_participant(&self, participant_id: Uuid) -> Result<(), AppError>;
    async fn invite_participants_to_trip(
        &self,
        trip_id: Uuid,
        emails: &[String],
    ) -> Result<Vec<Uuid>, AppError>;
    async fn create_activity(&self, activity: NewActivity) -> Result<Uuid, AppError>;
    async fn get_trip_activities(&self, trip_id: Uuid) -> Result<Vec<Activity>, AppError>;
    async fn create_trip_link(&self, link: NewLink) -> Result<Uuid, AppError>;
    async fn get_trip_links(&self, trip_id: Uuid) -> Result<Vec<Link>, AppError>;
}

/// SQLite statements bind three values per participant row. 999 is the
/// lowest variable limit SQLite has shipped with.
const PARTICIPANT_ROWS_PER_INSERT: usize = 999 / 3;

const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteTripStore {
    pool: DbPool,
    write_timeout: Duration,
}

impl SqliteTripStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Deadline for opening a transaction and running its inserts.
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    async fn staged<T>(
        &self,
        stage: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        tokio::time::timeout(self.write_timeout, stage)
            .await
            .unwrap_or(Err(AppError::Timeout))
    }
}

#[async_trait]
impl TripStore for SqliteTripStore {
    async fn create_trip(&self, trip: NewTrip) -> Result<Uuid, AppError> {
        // Dropping an uncommitted transaction rolls it back, so every early
        // return below (including the future being cancelled) leaves nothing.
        let (tx, trip_id) = self
            .staged(async {
                let mut tx = self.pool.begin().await?;

                let trip_id = Uuid::new_v4();
                sqlx::query(
                    r#"INSERT INTO trips (id, destination, owner_name, owner_email, starts_at, ends_at, is_confirmed)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, FALSE)"#,
                )
                .bind(trip_id)
                .bind(&trip.destination)
                .bind(&trip.owner_name)
                .bind(&trip.owner_email)
                .bind(trip.starts_at)
                .bind(trip.ends_at)
                .execute(&mut *tx)
                .await?;

                insert_participants(&mut tx, trip_id, &trip.emails_to_invite).await?;
                Ok::<_, AppError>((tx, trip_id))
            })
            .await?;

        tx.commit().await?;
        Ok(trip_id)
    }

    async fn get_trip(&self, trip_id: Uuid) -> Result<Option<Trip>, AppError> {
        let trip = sqlx::query_as::<_, Trip>(
            r#"SELECT id, destination, owner_name, owner_email, starts_at, ends_at, is_confirmed
               FROM trips WHERE id = ?1"#,
        )
        .bind(trip_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(trip)
    }

    async fn update_trip(&self, update: TripUpdate) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"UPDATE trips
               SET destination = ?1, starts_at = ?2, ends_at = ?3, is_confirmed = ?4
               WHERE id = ?5"#,
        )
        .bind(&update.destination)
        .bind(update.starts_at)
        .bind(update.ends_at)
        .bind(update.is_confirmed)
        .bind(update.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("trip not found".into()));
        }
        Ok(())
    }

    async fn get_participant(
        &self,
        participant_id: Uuid,
    ) -> Result<Option<Participant>, AppError> {
        let participant = sqlx::query_as::<_, Participant>(
            "SELECT id, trip_id, name, email, is_confirmed FROM participants WHERE id = ?1",
        )
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(participant)
    }

    async fn get_participants(&self, trip_id: Uuid) -> Result<Vec<Participant>, AppError> {
        let participants = sqlx::query_as::<_, Participant>(
            r#"SELECT id, trip_id, name, email, is_confirmed
               FROM participants WHERE trip_id = ?1 ORDER BY rowid"#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(participants)
    }

    async fn confirm_participant(&self, participant_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE participants SET is_confirmed = TRUE WHERE id = ?1")
            .bind(participant_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("participant not found".into()));
        }
        Ok(())
    }

    async fn invite_participants_to_trip(
        &self,
        trip_id: Uuid,
        emails: &[String],
    ) -> Result<Vec<Uuid>, AppError> {
        let (tx, ids) = self
            .staged(async {
                let mut tx = self.pool.begin().await?;
                let ids = insert_participants(&mut tx, trip_id, emails).await?;
                Ok::<_, AppError>((tx, ids))
            })
            .await?;

        tx.commit().await?;
        Ok(ids)
    }

    async fn create_activity(&self, activity: NewActivity) -> Result<Uuid, AppError> {
        let activity_id = Uuid::new_v4();
        sqlx::query("INSERT INTO activities (id, trip_id, title, occurs_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(activity_id)
            .bind(activity.trip_id)
            .bind(&activity.title)
            .bind(activity.occurs_at)
            .execute(&self.pool)
            .await
            .map_err(AppError::from_store_write)?;
        Ok(activity_id)
    }

    async fn get_trip_activities(&self, trip_id: Uuid) -> Result<Vec<Activity>, AppError> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"SELECT id, trip_id, title, occurs_at
               FROM activities WHERE trip_id = ?1 ORDER BY occurs_at, rowid"#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(activities)
    }

    async fn create_trip_link(&self, link: NewLink) -> Result<Uuid, AppError> {
        let link_id = Uuid::new_v4();
        sqlx::query("INSERT INTO links (id, trip_id, title, url) VALUES (?1, ?2, ?3, ?4)")
            .bind(link_id)
            .bind(link.trip_id)
            .bind(&link.title)
            .bind(&link.url)
            .execute(&self.pool)
            .await
            .map_err(AppError::from_store_write)?;
        Ok(link_id)
    }

    async fn get_trip_links(&self, trip_id: Uuid) -> Result<Vec<Link>, AppError> {
        let links = sqlx::query_as::<_, Link>(
            "SELECT id, trip_id, title, url FROM links WHERE trip_id = ?1 ORDER BY rowid",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }
}

/// Multi-row INSERTs of at most [`PARTICIPANT_ROWS_PER_INSERT`] rows each.
/// Callers run this inside a transaction so the batch lands as a whole.
async fn insert_participants(
    conn: &mut SqliteConnection,
    trip_id: Uuid,
    emails: &[String],
) -> Result<Vec<Uuid>, AppError> {
    if emails.is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<(Uuid, &str)> = emails
        .iter()
        .map(|email| (Uuid::new_v4(), email.as_str()))
        .collect();

    for chunk in rows.chunks(PARTICIPANT_ROWS_PER_INSERT) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO participants (id, trip_id, email) ");
        builder.push_values(chunk, |mut row, (id, email)| {
            row.push_bind(*id).push_bind(trip_id).push_bind(*email);
        });
        builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(AppError::from_store_write)?;
    }

    Ok(rows.into_iter().map(|(id, _)| id).collect())
}
