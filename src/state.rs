use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        mail::MailTransport,
        notifier::Notifier,
        storage::{SqliteTripStore, TripStore},
        trips::TripService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub trips: TripService,
}

impl AppState {
    /// Wires the shared pool into the store, and the store into both the
    /// trip service and the notifier.
    pub fn new(config: &AppConfig, db: DbPool, transport: Arc<dyn MailTransport>) -> Self {
        let store: Arc<dyn TripStore> = Arc::new(
            SqliteTripStore::new(db).with_write_timeout(config.store_timeout),
        );
        let notifier = Notifier::new(
            store.clone(),
            transport,
            config.mailer.from.clone(),
            config.store_timeout,
        );
        let trips = TripService::new(store, notifier, config.store_timeout);
        Self { trips }
    }
}
