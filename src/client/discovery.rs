//! Bootstrap, metadata and group-coordinator discovery.
//!
//! The `*_inline` operations run against a caller-held snapshot and never
//! touch the state cell; queued counterparts wrap them in a cell updater.
//! Reentrant paths (a refresh that itself needs a bootstrap redo) stay
//! inline, so the writer slot is never re-entered.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::engine::{Engine, Mode};
use crate::client::error::{Error, Result};
use crate::cluster::state::{Broker, ClusterState, BOOTSTRAP_NODE_ID};
use crate::connection::{dns, EndPoint};
use crate::protocol::messages::{
    CoordinatorType, FindCoordinatorRequest, MetadataRequest, MetadataResponse, RequestMessage,
    ResponseMessage,
};

impl Engine {
    /// Bootstrap through the cell; used by `connect()`.
    pub(crate) async fn bootstrap(&self) -> Result<()> {
        self.cell
            .update_async(|state| async move { Ok((self.bootstrap_inline(state).await?, ())) })
            .await
    }

    /// Walks the configured bootstrap servers until one channel opens, then
    /// installs it together with the sentinel bootstrap broker.
    pub(crate) async fn bootstrap_inline(
        &self,
        state: Arc<ClusterState>,
    ) -> Result<Arc<ClusterState>> {
        if self.bootstrap_servers.is_empty() {
            return Err(Error::BootstrapExhausted { attempts: 0 });
        }

        let mut retry = self.bootstrap_retry.init();
        loop {
            for uri in &self.bootstrap_servers {
                let broker = Broker {
                    node_id: BOOTSTRAP_NODE_ID,
                    host: uri.host.clone(),
                    port: uri.port,
                };
                debug!(%uri, attempt = retry.attempt(), "Attempting bootstrap");

                let addrs = match dns::get_all_ipv4(&uri.host, uri.port).await {
                    Ok(addrs) => addrs,
                    Err(error) => {
                        warn!(%uri, error = %error, "Bootstrap host did not resolve");
                        continue;
                    }
                };

                for addr in addrs {
                    match self.connector.connect(&self.ctx, EndPoint(addr)).await {
                        Ok(chan) => {
                            info!(%broker, endpoint = %chan.endpoint(), "Bootstrap connection established");
                            let next = state
                                .add_channel(&broker, chan)
                                .update_bootstrap_broker(broker);
                            return Ok(Arc::new(next));
                        }
                        Err(error) if error.is_fatal() => return Err(error.into()),
                        Err(error) => {
                            warn!(%broker, endpoint = %addr, error = %error, "Bootstrap connect failed");
                        }
                    }
                }
            }

            retry = match self.bootstrap_retry.await_next(retry).await {
                Some(next) => next,
                None => {
                    return Err(Error::BootstrapExhausted {
                        attempts: retry.attempt(),
                    })
                }
            };
        }
    }

    /// Fetches metadata for the topics and applies it to the snapshot.
    pub(crate) async fn metadata_inline(
        &self,
        state: Arc<ClusterState>,
        topics: &[String],
    ) -> Result<Arc<ClusterState>> {
        let (response, state) = self.metadata_roundtrip(state, topics).await?;
        Ok(Arc::new(apply_metadata(&state, &response)))
    }

    /// Metadata fetch through the cell, handing the raw response back; used
    /// by the public `get_metadata`. Always refreshes.
    pub(crate) async fn get_metadata(&self, topics: &[String]) -> Result<MetadataResponse> {
        self.cell
            .update_async(|state| async move {
                let (response, state) = self.metadata_roundtrip(state, topics).await?;
                let next = apply_metadata(&state, &response);
                Ok((Arc::new(next), response))
            })
            .await
    }

    async fn metadata_roundtrip(
        &self,
        state: Arc<ClusterState>,
        topics: &[String],
    ) -> Result<(MetadataResponse, Arc<ClusterState>)> {
        let request = RequestMessage::Metadata(MetadataRequest {
            topics: topics.to_vec(),
        });
        let (response, mode) = self
            .send_routed(request, self.request_retry.init(), Mode::Inline(state))
            .await?;

        match response {
            ResponseMessage::Metadata(response) => Ok((response, mode.into_state(&self.cell))),
            other => Err(Error::InvalidResponse(format!(
                "expected Metadata response, got {:?}",
                other.api_key()
            ))),
        }
    }

    /// Discovers the group's coordinator and applies it to the snapshot.
    pub(crate) async fn coordinator_inline(
        &self,
        state: Arc<ClusterState>,
        group_id: &str,
    ) -> Result<Arc<ClusterState>> {
        let (broker, state) = self.coordinator_roundtrip(state, group_id).await?;
        Ok(Arc::new(
            state.update_group_coordinator(broker, group_id.to_owned()),
        ))
    }

    /// Coordinator fetch through the cell, handing the coordinator back;
    /// used by the public `get_group_coordinator`. Always refreshes.
    pub(crate) async fn get_group_coordinator(&self, group_id: &str) -> Result<Broker> {
        self.cell
            .update_async(|state| async move {
                let (broker, state) = self.coordinator_roundtrip(state, group_id).await?;
                let next = state.update_group_coordinator(broker.clone(), group_id.to_owned());
                Ok((Arc::new(next), broker))
            })
            .await
    }

    async fn coordinator_roundtrip(
        &self,
        state: Arc<ClusterState>,
        group_id: &str,
    ) -> Result<(Broker, Arc<ClusterState>)> {
        let request = RequestMessage::FindCoordinator(FindCoordinatorRequest {
            key: group_id.to_owned(),
            key_type: CoordinatorType::Group,
        });
        let (response, mode) = self
            .send_routed(request, self.request_retry.init(), Mode::Inline(state))
            .await?;

        let response = match response {
            ResponseMessage::FindCoordinator(response) => response,
            other => {
                return Err(Error::InvalidResponse(format!(
                    "expected FindCoordinator response, got {:?}",
                    other.api_key()
                )))
            }
        };

        if let Some(code) = response.error_code {
            return Err(Error::InvalidResponse(format!(
                "find coordinator for group '{group_id}' failed: {code}"
            )));
        }
        let port = u16::try_from(response.port).map_err(|_| {
            Error::InvalidResponse(format!("coordinator port {} out of range", response.port))
        })?;

        let broker = Broker {
            node_id: response.node_id,
            host: response.host,
            port,
        };
        Ok((broker, mode.into_state(&self.cell)))
    }
}

/// Folds a metadata response into the snapshot, logging partitions the
/// cluster reports as leaderless (they become unrouteable until the next
/// refresh finds a leader).
fn apply_metadata(state: &ClusterState, response: &MetadataResponse) -> ClusterState {
    let brokers: Vec<Broker> = response.brokers.iter().map(Broker::from).collect();

    let mut leaders = Vec::new();
    for topic in &response.topics {
        if topic.error_code.is_some() {
            debug!(topic = topic.name.as_str(), error = ?topic.error_code, "Skipping erroring topic in metadata");
            continue;
        }
        for partition in &topic.partitions {
            if partition.leader_id < 0 {
                warn!(
                    topic = topic.name.as_str(),
                    partition = partition.partition_index,
                    "Partition is leaderless",
                );
            }
            leaders.push((
                topic.name.clone(),
                partition.partition_index,
                partition.leader_id,
            ));
        }
    }

    state.update_metadata(brokers, &leaders)
}
