use crate::protocol::error::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveGroupRequest {
    /// The group to leave.
    pub group_id: String,

    /// The member that is leaving.
    pub member_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveGroupResponse {
    pub throttle_time_ms: Option<i32>,

    /// The error if any.
    pub error_code: Option<ErrorCode>,
}
