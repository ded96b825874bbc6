//! The client-facing error taxonomy.

use thiserror::Error;

use crate::cluster::router::RouteType;
use crate::connection::uri::InvalidUri;
use crate::connection::ChanError;
use crate::protocol::error::ErrorCode;
use crate::protocol::messages::{RequestMessage, ResponseMessage};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A fatal wire-level failure, propagated unchanged.
    #[error("Channel error: {0}")]
    Channel(#[from] ChanError),

    #[error(transparent)]
    InvalidUri(#[from] InvalidUri),

    /// No broker could be found for the route after spending the retry
    /// budget.
    #[error("No route to {route} after {attempts} attempts")]
    MissingRoute {
        route: RouteType,
        attempts: u32,
        /// The request that could not be routed.
        last_request: Box<RequestMessage>,
    },

    /// A retriable fault outlived the retry budget.
    #[error("Retry budget exhausted after {attempts} attempts: {context}")]
    RetryExhausted {
        context: String,
        attempts: u32,
        /// The request in flight when the budget ran out.
        last_request: Box<RequestMessage>,
        /// The last response observed, absent when the failure was at the
        /// channel level.
        last_response: Option<Box<ResponseMessage>>,
    },

    /// Every configured bootstrap server failed across the bootstrap policy.
    #[error("All bootstrap servers failed after {attempts} attempts")]
    BootstrapExhausted { attempts: u32 },

    /// A protocol error the core refuses to absorb.
    #[error("Server error {error_code} from broker {broker} on {api_key:?} request")]
    Escalated {
        error_code: ErrorCode,
        /// The broker's `host:port`, for diagnostics.
        broker: String,
        api_key: crate::protocol::api_key::ApiKey,
        request: Box<RequestMessage>,
        response: Box<ResponseMessage>,
    },

    /// The broker answered with something the engine cannot interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The handle has been closed.
    #[error("Connection handle closed")]
    Closed,
}
