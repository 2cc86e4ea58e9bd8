use std::{sync::Arc, time::Duration};

use askama::Template;
use lettre::{message::Mailbox, Address};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, field, info, info_span, Instrument, Span};
use uuid::Uuid;

use crate::{error::AppError, models::Trip};

use super::{
    mail::{MailTransport, OutgoingMail},
    storage::TripStore,
};

const TRIP_CREATED_TEMPLATE: &str = "mail/trip_created.html";
const TRIP_CONFIRMED_TEMPLATE: &str = "mail/trip_confirmed.html";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("trip {0} does not exist")]
    TripMissing(Uuid),
    #[error("failed to load trip: {0}")]
    Store(#[from] AppError),
    #[error("failed to render mail body: {0}")]
    Render(#[from] askama::Error),
    #[error("invalid recipient address: {0}")]
    Recipient(#[from] lettre::address::AddressError),
    #[error("mail transport failed: {0}")]
    Transport(String),
}

#[derive(Template)]
#[template(path = "mail/trip_created.html")]
struct TripCreatedMail<'a> {
    trip: &'a Trip,
    starts_on: String,
    ends_on: String,
}

#[derive(Template)]
#[template(path = "mail/trip_confirmed.html")]
struct TripConfirmedMail<'a> {
    trip: &'a Trip,
    starts_on: String,
    ends_on: String,
}

/// Best-effort trip owner emails.
///
/// The `dispatch_*` methods launch a detached task and return immediately.
/// Whatever happens inside that task is only visible in the logs; the
/// returned handle resolves to `()` either way and callers may simply drop
/// it.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn TripStore>,
    transport: Arc<dyn MailTransport>,
    from: Mailbox,
    store_timeout: Duration,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn TripStore>,
        transport: Arc<dyn MailTransport>,
        from: Mailbox,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            from,
            store_timeout,
        }
    }

    pub fn dispatch_trip_created(&self, trip_id: Uuid) -> JoinHandle<()> {
        let notifier = self.clone();
        let span = notification_span("trip_created", trip_id);
        tokio::spawn(
            async move {
                if let Err(err) = notifier.notify_trip_created(trip_id).await {
                    error!(error = %err, "failed to send trip created email");
                }
            }
            .instrument(span),
        )
    }

    pub fn dispatch_trip_confirmed(&self, trip: Trip) -> JoinHandle<()> {
        let notifier = self.clone();
        let span = notification_span("trip_confirmed", trip.id);
        tokio::spawn(
            async move {
                if let Err(err) = notifier.notify_trip_confirmed(&trip).await {
                    error!(error = %err, "failed to send trip confirmed email");
                }
            }
            .instrument(span),
        )
    }

    /// Re-reads the trip so the mail reflects the latest committed state.
    pub async fn notify_trip_created(&self, trip_id: Uuid) -> Result<(), NotifyError> {
        let trip = tokio::time::timeout(self.store_timeout, self.store.get_trip(trip_id))
            .await
            .map_err(|_| AppError::Timeout)??
            .ok_or(NotifyError::TripMissing(trip_id))?;
        record_trip(&trip);

        let body = TripCreatedMail {
            trip: &trip,
            starts_on: format_day(&trip.starts_at),
            ends_on: format_day(&trip.ends_at),
        }
        .render()?;
        let subject = format!("Confirm your trip to {}", trip.destination);
        self.deliver(&trip, subject, TRIP_CREATED_TEMPLATE, body)
            .await
    }

    pub async fn notify_trip_confirmed(&self, trip: &Trip) -> Result<(), NotifyError> {
        record_trip(trip);

        let body = TripConfirmedMail {
            trip,
            starts_on: format_day(&trip.starts_at),
            ends_on: format_day(&trip.ends_at),
        }
        .render()?;
        let subject = format!("Your trip to {} is confirmed", trip.destination);
        self.deliver(trip, subject, TRIP_CONFIRMED_TEMPLATE, body)
            .await
    }

    async fn deliver(
        &self,
        trip: &Trip,
        subject: String,
        template: &'static str,
        html_body: String,
    ) -> Result<(), NotifyError> {
        let address: Address = trip.owner_email.parse()?;
        let mail = OutgoingMail {
            from: self.from.clone(),
            to: Mailbox::new(Some(trip.owner_name.clone()), address),
            subject,
            template,
            html_body,
        };
        self.transport.send(mail).await?;
        info!(to = %trip.owner_email, template, "notification email sent");
        Ok(())
    }
}

fn notification_span(kind: &'static str, trip_id: Uuid) -> Span {
    info_span!(
        "notification",
        kind,
        %trip_id,
        destination = field::Empty,
        owner_email = field::Empty,
    )
}

fn record_trip(trip: &Trip) {
    let span = Span::current();
    span.record("destination", trip.destination.as_str());
    span.record("owner_email", trip.owner_email.as_str());
}

fn format_day(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%d %b %Y").to_string()
}
