//! The parts of the Kafka protocol this crate routes on.
//!
//! Wire encoding lives behind the [`Channel`](crate::connection::Channel)
//! collaborator; here messages are plain tagged variants.

pub mod api_key;
pub mod api_version;
pub mod error;
pub mod messages;
