use crate::protocol::error::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeGroupsRequest {
    /// The names of the groups to describe.
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeGroupsResponse {
    pub throttle_time_ms: Option<i32>,

    /// Each described group.
    pub groups: Vec<DescribedGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribedGroup {
    /// The describe error if any.
    pub error_code: Option<ErrorCode>,

    /// The group ID.
    pub group_id: String,

    /// The group state, e.g. "Stable".
    pub state: String,

    /// The group protocol type, or empty if the group is not known.
    pub protocol_type: String,

    /// The selected group protocol, or empty if the group is not known.
    pub protocol: String,

    /// The group members.
    pub members: Vec<DescribedGroupMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribedGroupMember {
    /// The member ID.
    pub member_id: String,

    /// The client ID used in the member's latest join group request.
    pub client_id: String,

    /// The client host.
    pub client_host: String,
}
