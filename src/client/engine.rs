//! The request engine: route, send, classify, recover, retry.

use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::backoff::{RetryPolicy, RetryState};
use crate::client::error::{Error, Result};
use crate::cluster::classify::{classify, RecoveryAction};
use crate::cluster::router::{route, RouteType};
use crate::cluster::state::{Broker, ClusterState};
use crate::cluster::StateCell;
use crate::connection::uri::BrokerUri;
use crate::connection::{dns, BrokerChannel, ChanError, ConnectContext, Connector, EndPoint};
use crate::protocol::api_key::ApiKey;
use crate::protocol::messages::{
    FetchResponse, ListGroupsResponse, ListOffsetsResponse, RequestMessage, ResponseMessage,
};

/// Shared core behind the public handle.
#[derive(Debug)]
pub(crate) struct Engine {
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) ctx: ConnectContext,
    pub(crate) cell: StateCell,
    pub(crate) bootstrap_servers: Vec<BrokerUri>,
    pub(crate) bootstrap_retry: RetryPolicy,
    pub(crate) request_retry: RetryPolicy,
}

/// Whether state mutations go through the cell's writer queue, or apply to a
/// snapshot owned by the updater this send is running inside of.
///
/// The inline form exists for reentrant paths only: a metadata refresh that
/// itself needs a bootstrap redo must not enqueue behind the writer slot it
/// is already holding.
#[derive(Debug, Default)]
pub(crate) enum Mode {
    #[default]
    Queued,
    Inline(Arc<ClusterState>),
}

impl Mode {
    fn snapshot(&self, cell: &StateCell) -> Arc<ClusterState> {
        match self {
            Self::Queued => cell.peek(),
            Self::Inline(state) => Arc::clone(state),
        }
    }

    pub(crate) fn into_state(self, cell: &StateCell) -> Arc<ClusterState> {
        match self {
            Self::Queued => cell.peek(),
            Self::Inline(state) => state,
        }
    }
}

/// Outcome of one attempt against one broker.
enum Flow {
    Delivered(ResponseMessage),
    /// Recovery ran (or the fault was transient); re-route and resend.
    Retry(RetryState),
}

impl Engine {
    pub(crate) async fn send(&self, request: RequestMessage) -> Result<ResponseMessage> {
        let (response, _mode) = self
            .send_routed(request, self.request_retry.init(), Mode::Queued)
            .await?;
        Ok(response)
    }

    /// The full engine loop. Boxed because recovery recurses into it.
    pub(crate) fn send_routed(
        &self,
        request: RequestMessage,
        retry: RetryState,
        mode: Mode,
    ) -> BoxFuture<'_, Result<(ResponseMessage, Mode)>> {
        async move {
            let mut retry = retry;
            let mut mode = mode;

            loop {
                let state = mode.snapshot(&self.cell);
                match route(&state, &request) {
                    Err(route_type) => {
                        debug!(%route_type, attempt = retry.attempt(), "No route, recovering");
                        retry = match self.request_retry.await_next(retry).await {
                            Some(next) => next,
                            None => {
                                return Err(Error::MissingRoute {
                                    route: route_type,
                                    attempts: retry.attempt(),
                                    last_request: Box::new(request.clone()),
                                })
                            }
                        };
                        mode = self.recover(route_type, state.version(), mode).await?;
                    }

                    Ok(mut routes) if routes.len() == 1 => {
                        let (sub_request, broker) = routes.remove(0);
                        let attempt = self
                            .send_one(&sub_request, &broker, retry, state.version(), &mut mode)
                            .await?;
                        match attempt {
                            Flow::Delivered(response) => return Ok((response, mode)),
                            Flow::Retry(next) => retry = next,
                        }
                    }

                    Ok(routes) => {
                        if matches!(mode, Mode::Inline(_)) {
                            return Err(Error::InvalidResponse(format!(
                                "{:?} request fanned out during recovery",
                                request.api_key()
                            )));
                        }
                        let api_key = request.api_key();
                        let results = join_all(routes.into_iter().map(|(sub_request, broker)| {
                            self.send_sub(sub_request, broker, retry, state.version())
                        }))
                        .await;
                        let responses = results.into_iter().collect::<Result<Vec<_>>>()?;
                        return Ok((gather(api_key, responses)?, mode));
                    }
                }
            }
        }
        .boxed()
    }

    /// One scattered sub-request. Already routed; on recovery it re-enters
    /// the full engine so only the affected part is retried.
    fn send_sub(
        &self,
        sub_request: RequestMessage,
        broker: Broker,
        retry: RetryState,
        observed: u64,
    ) -> BoxFuture<'_, Result<ResponseMessage>> {
        async move {
            let mut mode = Mode::Queued;
            let attempt = self
                .send_one(&sub_request, &broker, retry, observed, &mut mode)
                .await?;
            match attempt {
                Flow::Delivered(response) => Ok(response),
                Flow::Retry(next) => {
                    let (response, _mode) = self.send_routed(sub_request, next, mode).await?;
                    Ok(response)
                }
            }
        }
        .boxed()
    }

    /// One attempt of one already-routed sub-request against one broker.
    ///
    /// `observed` is the version of the routing snapshot; queued recovery
    /// uses it to tell whether the committed state has already moved past
    /// what this attempt was routed on.
    async fn send_one(
        &self,
        request: &RequestMessage,
        broker: &Broker,
        retry: RetryState,
        observed: u64,
        mode: &mut Mode,
    ) -> Result<Flow> {
        let chan = match self.resolve_channel(broker, mode).await {
            Ok(chan) => chan,
            Err(error) if error.is_fatal() => return Err(error.into()),
            Err(error) => return self.channel_failed(request, broker, retry, mode, error).await,
        };

        let response = match chan.send(request.clone()).await {
            Ok(response) => response,
            Err(error) if error.is_fatal() => return Err(error.into()),
            Err(error) => return self.channel_failed(request, broker, retry, mode, error).await,
        };

        match classify(&response) {
            None => Ok(Flow::Delivered(response)),

            Some((code, RecoveryAction::PassThru)) => {
                debug!(%broker, %code, "Passing erroring response through to caller");
                Ok(Flow::Delivered(response))
            }

            Some((code, RecoveryAction::Escalate)) => Err(Error::Escalated {
                error_code: code,
                broker: broker.to_string(),
                api_key: request.api_key(),
                request: Box::new(request.clone()),
                response: Box::new(response),
            }),

            Some((code, RecoveryAction::WaitAndRetry)) => {
                warn!(%broker, %code, attempt = retry.attempt(), "Transient server fault, backing off");
                let retry = self
                    .advance(
                        retry,
                        format!("{code} from broker {broker}"),
                        request,
                        Some(&response),
                    )
                    .await?;
                Ok(Flow::Retry(retry))
            }

            Some((code, RecoveryAction::RefreshMetadata(topics))) => {
                warn!(%broker, %code, ?topics, "Routing state stale, refreshing metadata");
                let retry = self
                    .advance(
                        retry,
                        format!("{code} from broker {broker}"),
                        request,
                        Some(&response),
                    )
                    .await?;
                // A metadata request cannot refresh itself; resending it is
                // the refresh.
                if !matches!(request, RequestMessage::Metadata(_)) {
                    *mode = self
                        .recover(RouteType::Topic(topics), observed, std::mem::take(mode))
                        .await?;
                }
                Ok(Flow::Retry(retry))
            }
        }
    }

    async fn advance(
        &self,
        retry: RetryState,
        context: String,
        request: &RequestMessage,
        last_response: Option<&ResponseMessage>,
    ) -> Result<RetryState> {
        self.request_retry
            .await_next(retry)
            .await
            .ok_or_else(|| Error::RetryExhausted {
                context,
                attempts: retry.attempt(),
                last_request: Box::new(request.clone()),
                last_response: last_response.map(|response| Box::new(response.clone())),
            })
    }

    /// The broker is unreachable: evict it, repair whatever route the
    /// request was on, and signal a resend.
    async fn channel_failed(
        &self,
        request: &RequestMessage,
        broker: &Broker,
        retry: RetryState,
        mode: &mut Mode,
        error: ChanError,
    ) -> Result<Flow> {
        warn!(%broker, error = %error, "Channel failure, evicting broker");

        let evicted = match mode {
            Mode::Inline(state) => {
                let (next, chan) = state.remove_broker(broker);
                *state = Arc::new(next);
                chan
            }
            Mode::Queued => {
                self.cell
                    .update_with_result(|state| state.remove_broker(broker))
                    .await
            }
        };
        if let Some(chan) = evicted {
            tokio::spawn(async move { chan.close().await });
        }

        let retry = self
            .advance(
                retry,
                format!("channel to broker {broker}: {error}"),
                request,
                None,
            )
            .await?;

        let observed = mode.snapshot(&self.cell).version();
        let route_type = RouteType::of_request(request);
        *mode = self
            .recover(route_type, observed, std::mem::take(mode))
            .await?;

        Ok(Flow::Retry(retry))
    }

    /// Runs the discovery matching a route miss.
    ///
    /// Queued mode funnels through the state cell, where updaters that find
    /// the committed state already newer than what the caller observed (and
    /// covering what it needs) return it untouched. Coordinator refreshes
    /// deliberately never take that shortcut.
    pub(crate) async fn recover(
        &self,
        route_type: RouteType,
        observed_version: u64,
        mode: Mode,
    ) -> Result<Mode> {
        match mode {
            Mode::Inline(state) => {
                let state = match route_type {
                    RouteType::Bootstrap => self.bootstrap_inline(state).await?,
                    RouteType::Group(group_id) => {
                        self.coordinator_inline(state, &group_id).await?
                    }
                    RouteType::Topic(topics) => self.metadata_inline(state, &topics).await?,
                    RouteType::AllBrokers => self.metadata_inline(state, &[]).await?,
                };
                Ok(Mode::Inline(state))
            }

            Mode::Queued => {
                match route_type {
                    RouteType::Bootstrap => {
                        self.cell
                            .update_async(|state| async move {
                                if state.version() > observed_version
                                    && state.bootstrap_broker().is_some()
                                {
                                    debug!("Bootstrap already redone by an earlier updater");
                                    return Ok::<_, Error>((state, ()));
                                }
                                Ok((self.bootstrap_inline(state).await?, ()))
                            })
                            .await?
                    }

                    RouteType::Group(group_id) => {
                        self.cell
                            .update_async(|state| async move {
                                Ok::<_, Error>((self.coordinator_inline(state, &group_id).await?, ()))
                            })
                            .await?
                    }

                    RouteType::Topic(topics) => {
                        self.cell
                            .update_async(|state| async move {
                                if state.version() > observed_version
                                    && state.contains_topic_metadata(&topics)
                                {
                                    debug!(
                                        ?topics,
                                        "Metadata already refreshed by an earlier updater"
                                    );
                                    return Ok::<_, Error>((state, ()));
                                }
                                Ok((self.metadata_inline(state, &topics).await?, ()))
                            })
                            .await?
                    }

                    RouteType::AllBrokers => {
                        self.cell
                            .update_async(|state| async move {
                                if state.version() > observed_version && !state.brokers().is_empty()
                                {
                                    return Ok::<_, Error>((state, ()));
                                }
                                Ok((self.metadata_inline(state, &[]).await?, ()))
                            })
                            .await?
                    }
                }
                Ok(Mode::Queued)
            }
        }
    }

    /// Finds or lazily opens the channel to a broker.
    async fn resolve_channel(
        &self,
        broker: &Broker,
        mode: &mut Mode,
    ) -> Result<BrokerChannel, ChanError> {
        let state = mode.snapshot(&self.cell);

        if let Some(chan) = state.channel_for(broker) {
            match chan.ensure_open().await {
                Ok(()) => return Ok(chan),
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    debug!(%broker, error = %error, "Cached channel no longer open, dialing a new one");
                }
            }
        }

        let addrs = dns::get_all_ipv4(&broker.host, broker.port).await?;
        let mut last_error = None;
        for addr in addrs {
            let endpoint = EndPoint(addr);
            if let Some(chan) = state.channel_for_endpoint(&endpoint) {
                if chan.ensure_open().await.is_ok() {
                    return Ok(chan);
                }
            }

            match self.connector.connect(&self.ctx, endpoint).await {
                Ok(chan) => {
                    debug!(%broker, %endpoint, "Opened broker channel");
                    match mode {
                        Mode::Inline(held) => {
                            *held = Arc::new(held.add_channel(broker, Arc::clone(&chan)));
                        }
                        Mode::Queued => {
                            self.cell
                                .update(|state| state.add_channel(broker, Arc::clone(&chan)))
                                .await;
                        }
                    }
                    return Ok(chan);
                }
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    warn!(%broker, %endpoint, error = %error, "Failed to open broker channel");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ChanError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no addresses resolved for {broker}"),
            ))
        }))
    }
}

/// Reassembles fan-out responses into one. Only the request kinds with a
/// defined combination rule appear here; everything else cannot gather.
fn gather(api_key: ApiKey, responses: Vec<ResponseMessage>) -> Result<ResponseMessage> {
    match api_key {
        ApiKey::Fetch => {
            let mut throttle_time_ms = None;
            let mut topics = Vec::new();
            for response in responses {
                match response {
                    ResponseMessage::Fetch(r) => {
                        throttle_time_ms = max_throttle(throttle_time_ms, r.throttle_time_ms);
                        topics.extend(r.responses);
                    }
                    other => return Err(mismatch(api_key, &other)),
                }
            }
            Ok(ResponseMessage::Fetch(FetchResponse {
                throttle_time_ms,
                responses: topics,
            }))
        }

        ApiKey::ListOffsets => {
            let mut throttle_time_ms = None;
            let mut topics = Vec::new();
            for response in responses {
                match response {
                    ResponseMessage::ListOffsets(r) => {
                        throttle_time_ms = max_throttle(throttle_time_ms, r.throttle_time_ms);
                        topics.extend(r.topics);
                    }
                    other => return Err(mismatch(api_key, &other)),
                }
            }
            Ok(ResponseMessage::ListOffsets(ListOffsetsResponse {
                throttle_time_ms,
                topics,
            }))
        }

        ApiKey::ListGroups => {
            let mut throttle_time_ms = None;
            let mut error_code = None;
            let mut groups = Vec::new();
            for response in responses {
                match response {
                    ResponseMessage::ListGroups(r) => {
                        throttle_time_ms = max_throttle(throttle_time_ms, r.throttle_time_ms);
                        error_code = error_code.or(r.error_code);
                        groups.extend(r.groups);
                    }
                    other => return Err(mismatch(api_key, &other)),
                }
            }
            Ok(ResponseMessage::ListGroups(ListGroupsResponse {
                throttle_time_ms,
                error_code,
                groups,
            }))
        }

        other => Err(Error::InvalidResponse(format!(
            "no gather rule for {other:?} fan-out"
        ))),
    }
}

fn max_throttle(a: Option<i32>, b: Option<i32>) -> Option<i32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

fn mismatch(expected: ApiKey, got: &ResponseMessage) -> Error {
    Error::InvalidResponse(format!(
        "expected {expected:?} response in gather, got {:?}",
        got.api_key()
    ))
}
