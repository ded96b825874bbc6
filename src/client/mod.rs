//! The public connection handle and its builder.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backoff::RetryPolicy;
use crate::cluster::state::Broker;
use crate::cluster::StateCell;
use crate::connection::uri::BrokerUri;
use crate::connection::{ConnectContext, Connector, TcpConfig};
use crate::protocol::api_key::ApiKey;
use crate::protocol::api_version::{
    ApiVersion, ApiVersionTable, KafkaVersion, API_VERSIONS_BASELINE,
};
use crate::protocol::messages::{
    ApiVersionsRequest, MetadataResponse, RequestMessage, ResponseMessage,
};

mod discovery;
mod engine;
pub mod error;

use self::engine::Engine;
use error::{Error, Result};

pub const DEFAULT_CLIENT_ID: &str = "kaflink";

/// Builder for [`Client`].
pub struct ClientBuilder {
    bootstrap_servers: Vec<String>,
    connector: Arc<dyn Connector>,
    client_id: Option<Arc<str>>,
    version: KafkaVersion,
    auto_api_versions: bool,
    bootstrap_retry_policy: RetryPolicy,
    request_retry_policy: RetryPolicy,
    tcp_config: TcpConfig,
}

impl ClientBuilder {
    /// Create a new [`ClientBuilder`] with the list of bootstrap broker URIs
    /// and the transport that opens channels to them.
    pub fn new(bootstrap_servers: Vec<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            bootstrap_servers,
            connector,
            client_id: None,
            version: KafkaVersion::V0_10_1,
            auto_api_versions: true,
            bootstrap_retry_policy: RetryPolicy::constant_bounded_ms(1000, 3),
            request_retry_policy: RetryPolicy::constant_bounded_ms(1000, 20),
            tcp_config: TcpConfig::default(),
        }
    }

    /// Sets client ID.
    pub fn client_id(mut self, client_id: impl Into<Arc<str>>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Target server protocol version.
    pub fn version(mut self, version: KafkaVersion) -> Self {
        self.version = version;
        self
    }

    /// Whether to negotiate API versions after bootstrap. Ignored for server
    /// versions that predate the `ApiVersions` request.
    pub fn auto_api_versions(mut self, auto_api_versions: bool) -> Self {
        self.auto_api_versions = auto_api_versions;
        self
    }

    /// Policy applied to bootstrap connection attempts.
    pub fn bootstrap_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.bootstrap_retry_policy = policy;
        self
    }

    /// Policy applied to per-request recoveries.
    pub fn request_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.request_retry_policy = policy;
        self
    }

    /// Options forwarded opaquely to the transport.
    pub fn tcp_config(mut self, tcp_config: TcpConfig) -> Self {
        self.tcp_config = tcp_config;
        self
    }

    /// Bootstraps against the configured servers and builds the handle.
    pub async fn connect(self) -> Result<Client> {
        let bootstrap_servers = self
            .bootstrap_servers
            .iter()
            .map(|s| BrokerUri::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        let conn_id = Uuid::new_v4();
        let api_versions = Arc::new(RwLock::new(ApiVersionTable::for_server(self.version)));
        let engine = Arc::new(Engine {
            connector: self.connector,
            ctx: ConnectContext {
                conn_id,
                client_id: self
                    .client_id
                    .unwrap_or_else(|| Arc::from(DEFAULT_CLIENT_ID)),
                api_versions: Arc::clone(&api_versions),
                tcp: self.tcp_config,
            },
            cell: StateCell::new(),
            bootstrap_servers,
            bootstrap_retry: self.bootstrap_retry_policy,
            request_retry: self.request_retry_policy,
        });

        info!(%conn_id, version = %self.version, "Connecting to cluster");
        engine.bootstrap().await?;

        if self.auto_api_versions && self.version >= API_VERSIONS_BASELINE {
            match engine
                .send(RequestMessage::ApiVersions(ApiVersionsRequest {}))
                .await?
            {
                ResponseMessage::ApiVersions(response) => {
                    debug!(apis = response.api_keys.len(), "Negotiated API versions");
                    let negotiated = ApiVersionTable::negotiated(&api_versions.read(), &response);
                    *api_versions.write() = negotiated;
                }
                other => {
                    return Err(Error::InvalidResponse(format!(
                        "expected ApiVersions response, got {:?}",
                        other.api_key()
                    )))
                }
            }
        } else if self.auto_api_versions {
            debug!(version = %self.version, "Server predates ApiVersions, using the static table");
        }

        let (shutdown, _) = watch::channel(false);
        Ok(Client {
            engine,
            api_versions,
            shutdown,
            closed: AtomicBool::new(false),
        })
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder").finish_non_exhaustive()
    }
}

/// One logical connection to the whole cluster.
///
/// Routes each request to the broker(s) that must serve it, maintaining
/// connections and refreshing stale topology along the way. Cheap to share;
/// any number of tasks may send concurrently.
///
/// Must be constructed using [`ClientBuilder`].
#[derive(Debug)]
pub struct Client {
    engine: Arc<Engine>,
    api_versions: Arc<RwLock<ApiVersionTable>>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
}

impl Client {
    /// Sends a request to wherever it has to go and returns the reassembled
    /// response.
    pub async fn send(&self, request: RequestMessage) -> Result<ResponseMessage> {
        self.ensure_not_closed()?;
        self.engine.send(request).await
    }

    /// The protocol version to speak for an API, if the broker supports it
    /// at all.
    pub fn api_version(&self, key: ApiKey) -> Option<ApiVersion> {
        self.api_versions.read().get(key)
    }

    /// Fetches fresh metadata for the given topics (all topics if empty) and
    /// folds it into the routing state.
    pub async fn get_metadata(&self, topics: &[String]) -> Result<MetadataResponse> {
        self.ensure_not_closed()?;
        self.engine.get_metadata(topics).await
    }

    /// Discovers the coordinator for a group and installs it as the route
    /// for that group's requests.
    pub async fn get_group_coordinator(&self, group_id: &str) -> Result<Broker> {
        self.ensure_not_closed()?;
        self.engine.get_group_coordinator(group_id).await
    }

    /// All brokers currently known, in node-id order.
    pub fn brokers(&self) -> Vec<Broker> {
        self.engine.cell.peek().brokers()
    }

    /// The partitions currently known per topic.
    pub fn topic_partitions(&self) -> BTreeMap<String, Vec<i32>> {
        self.engine.cell.peek().topic_partitions()
    }

    /// Resolves once [`close`](Self::close) has been called. Auxiliary tasks
    /// (heartbeat loops, fetch drivers) watch this to wind down.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Publishes cancellation and closes every broker channel.
    ///
    /// In-flight sends are not aborted; they fail through their closed
    /// channels.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Closing connection handle");
        let _ = self.shutdown.send(true);
        self.engine.cell.dispose().await;
    }

    fn ensure_not_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}
