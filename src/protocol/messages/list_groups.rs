use crate::protocol::error::ErrorCode;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListGroupsRequest {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListGroupsResponse {
    pub throttle_time_ms: Option<i32>,

    /// The error if any.
    pub error_code: Option<ErrorCode>,

    /// Each group in the response.
    pub groups: Vec<ListGroupsResponseGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListGroupsResponseGroup {
    /// The group ID.
    pub group_id: String,

    /// The group protocol type.
    pub protocol_type: String,
}
