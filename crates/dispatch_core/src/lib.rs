pub mod config;
pub mod dispatch;
pub mod error;
pub mod location;
pub mod matching;
pub mod model;
pub mod notify;
pub mod payments;
pub mod pricing;
pub mod rides;
pub mod spatial;
pub mod store;
pub mod surge;
pub mod trips;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;
