use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::{
    db::{init_pool, run_migrations, DbPool},
    services::{
        mail::{MailTransport, OutgoingMail},
        notifier::{NotifyError, Notifier},
        storage::{SqliteTripStore, TripStore},
        trips::TripService,
    },
};

const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Migrated SQLite database living in a temp dir for the test's lifetime.
pub struct TestDb {
    pub pool: DbPool,
    _root: TempDir,
}

impl TestDb {
    pub async fn new() -> Self {
        let root = TempDir::new().expect("create temp dir");
        let url = format!("sqlite://{}", root.path().join("test.sqlite").display());
        let pool = init_pool(&url).await.expect("open test database");
        run_migrations(&pool).await.expect("migrate test database");
        Self { pool, _root: root }
    }
}

pub fn trip_service(pool: &DbPool, transport: Arc<dyn MailTransport>) -> TripService {
    let store: Arc<dyn TripStore> = Arc::new(
        SqliteTripStore::new(pool.clone()).with_write_timeout(STORE_TIMEOUT),
    );
    let from = "Journey <noreply@journey.local>"
        .parse()
        .expect("valid sender mailbox");
    let notifier = Notifier::new(store.clone(), transport, from, STORE_TIMEOUT);
    TripService::new(store, notifier, STORE_TIMEOUT)
}

pub struct RecordingTransport {
    sent: mpsc::UnboundedSender<OutgoingMail>,
}

impl RecordingTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutgoingMail>) {
        let (sent, rx) = mpsc::unbounded_channel();
        (Self { sent }, rx)
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, mail: OutgoingMail) -> Result<(), NotifyError> {
        self.sent
            .send(mail)
            .map_err(|err| NotifyError::Transport(err.to_string()))
    }
}

pub struct FailingTransport;

/// Accepts the connection and then never answers.
pub struct HangingTransport;

#[async_trait]
impl MailTransport for HangingTransport {
    async fn send(&self, _mail: OutgoingMail) -> Result<(), NotifyError> {
        std::future::pending().await
    }
}

#[async_trait]
impl MailTransport for FailingTransport {
    async fn send(&self, _mail: OutgoingMail) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("connection refused".into()))
    }
}
