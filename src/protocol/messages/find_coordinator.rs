use crate::protocol::error::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorType {
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindCoordinatorRequest {
    /// The coordinator key, a group id for [`CoordinatorType::Group`].
    pub key: String,

    /// The coordinator key type.
    pub key_type: CoordinatorType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindCoordinatorResponse {
    pub throttle_time_ms: Option<i32>,

    /// The error if any.
    pub error_code: Option<ErrorCode>,

    /// The node id of the coordinator.
    pub node_id: i32,

    /// The host name of the coordinator.
    pub host: String,

    /// The port of the coordinator.
    pub port: i32,
}
