use crate::protocol::error::ErrorCode;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiVersionsRequest {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionsResponse {
    /// The top-level error if any.
    pub error_code: Option<ErrorCode>,

    /// The version ranges the broker supports, per API key.
    pub api_keys: Vec<ApiVersionsResponseKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionsResponseKey {
    /// The API key code.
    pub api_key: i16,

    /// The minimum supported version.
    pub min_version: i16,

    /// The maximum supported version.
    pub max_version: i16,
}
