use crate::protocol::error::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatRequest {
    /// The group id.
    pub group_id: String,

    /// The generation of the group.
    pub generation_id: i32,

    /// The member ID.
    pub member_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatResponse {
    pub throttle_time_ms: Option<i32>,

    /// The error if any.
    pub error_code: Option<ErrorCode>,
}
