//! The wire-channel contract.
//!
//! Framing, versioned encoding and request/response correlation live in the
//! transport crate that implements [`Channel`] and [`Connector`]; the routing
//! core only opens, reuses and closes channels through these traits.

use std::fmt::{Display, Formatter};
use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::api_version::ApiVersionTable;
use crate::protocol::messages::{RequestMessage, ResponseMessage};

pub mod dns;
pub mod uri;

pub use uri::BrokerUri;

/// A resolved broker address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndPoint(pub SocketAddrV4);

impl Display for EndPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connecting to broker timed out")]
    ConnectTimeout,

    #[error("Channel closed")]
    Closed,

    #[error("Cannot decode response: {0}")]
    Decode(String),

    #[error("Malformed frame: {0}")]
    Framing(String),

    #[error("Frame exceeds memory budget: {0}")]
    OutOfMemory(String),
}

impl ChanError {
    /// Decode, framing and allocation failures poison the request rather than
    /// the broker; they propagate to the caller without eviction or retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::Framing(_) | Self::OutOfMemory(_)
        )
    }
}

/// A live bidirectional broker connection.
///
/// Failure is terminal for a handle; the routing core evicts the broker and
/// opens a fresh channel on the next route.
#[async_trait]
pub trait Channel: std::fmt::Debug + Send + Sync {
    /// Send one request and await its response.
    ///
    /// Per-channel request/response ordering is this implementation's
    /// responsibility.
    async fn send(&self, request: RequestMessage) -> Result<ResponseMessage, ChanError>;

    /// Cheap liveness check consulted before a cached channel is reused.
    async fn ensure_open(&self) -> Result<(), ChanError>;

    async fn close(&self);

    /// The endpoint this channel is connected to, stable for its lifetime.
    fn endpoint(&self) -> EndPoint;
}

pub type BrokerChannel = Arc<dyn Channel>;

/// Options forwarded opaquely to the transport when dialing.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Abort dialing after this long.
    pub connect_timeout: Option<Duration>,

    pub nodelay: bool,

    pub send_buffer_size: Option<usize>,

    pub receive_buffer_size: Option<usize>,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
            nodelay: true,
            send_buffer_size: None,
            receive_buffer_size: None,
        }
    }
}

/// Per-handle identity threaded into every dial.
#[derive(Debug, Clone)]
pub struct ConnectContext {
    /// Unique handle identifier, auto-generated at construction.
    pub conn_id: Uuid,

    /// Opaque string sent on every request.
    pub client_id: Arc<str>,

    /// The per-API versions to encode at. Starts from the configured server
    /// version's defaults and is swapped for the negotiated table after
    /// connect, so later dials pick it up.
    pub api_versions: Arc<RwLock<ApiVersionTable>>,

    pub tcp: TcpConfig,
}

/// Opens channels against broker endpoints.
#[async_trait]
pub trait Connector: std::fmt::Debug + Send + Sync {
    async fn connect(
        &self,
        ctx: &ConnectContext,
        endpoint: EndPoint,
    ) -> Result<BrokerChannel, ChanError>;
}
