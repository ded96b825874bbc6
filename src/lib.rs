//! Routing and recovery core for Kafka-protocol clients.
//!
//! A cluster exposes many brokers; each hosts leader replicas for some
//! topic-partitions and may coordinate some consumer groups. This crate takes
//! typed protocol requests, routes each to the broker(s) that must serve it,
//! opens and reuses connections lazily, refreshes stale topology when errors
//! say it moved, and retries under a configured policy. Callers see a single
//! logical handle; broker topology, reconnection and coordinator relocation
//! stay hidden.
//!
//! The wire layer is a collaborator: anything implementing
//! [`connection::Channel`] and [`connection::Connector`] plugs in underneath.
//!
//! ```no_run
//! # async fn example(connector: std::sync::Arc<dyn kaflink::connection::Connector>) -> kaflink::Result<()> {
//! use kaflink::protocol::messages::{MetadataRequest, RequestMessage};
//!
//! let client = kaflink::ClientBuilder::new(
//!     vec!["kafka://broker-1:9092".to_owned(), "broker-2".to_owned()],
//!     connector,
//! )
//! .client_id("my-service")
//! .connect()
//! .await?;
//!
//! let response = client
//!     .send(RequestMessage::Metadata(MetadataRequest { topics: vec![] }))
//!     .await?;
//! # let _ = response;
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod client;
pub mod cluster;
pub mod connection;
pub mod protocol;

pub use client::error::{Error, Result};
pub use client::{Client, ClientBuilder};
pub use protocol::api_version::KafkaVersion;
