pub mod confirmation;
pub mod mail;
pub mod notifier;
pub mod storage;
pub mod trips;
