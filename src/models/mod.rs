pub mod activity;
pub mod link;
pub mod participant;
pub mod trip;

pub use activity::{Activity, NewActivity};
pub use link::{Link, NewLink};
pub use participant::Participant;
pub use trip::{NewTrip, Trip, TripUpdate};
