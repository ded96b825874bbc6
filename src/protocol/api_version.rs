//! Per-API protocol version selection.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use crate::protocol::api_key::ApiKey;
use crate::protocol::messages::ApiVersionsResponse;

/// The version a request is encoded at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion(pub i16);

/// A released server version, e.g. `0.10.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KafkaVersion(pub u16, pub u16, pub u16);

impl KafkaVersion {
    pub const V0_9_0: Self = Self(0, 9, 0);
    pub const V0_10_0: Self = Self(0, 10, 0);
    pub const V0_10_1: Self = Self(0, 10, 1);
}

impl Display for KafkaVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// Servers at or above this version answer `ApiVersions` requests.
pub const API_VERSIONS_BASELINE: KafkaVersion = KafkaVersion::V0_10_0;

/// Which version to speak per API key.
///
/// Starts from a static table keyed by the configured server version and is
/// replaced wholesale after a successful `ApiVersions` negotiation.
#[derive(Debug, Clone)]
pub struct ApiVersionTable {
    versions: HashMap<ApiKey, ApiVersion>,
}

impl ApiVersionTable {
    /// The defaults known to work against the given server release.
    pub fn for_server(version: KafkaVersion) -> Self {
        let mut versions = HashMap::from([
            (ApiKey::Produce, ApiVersion(1)),
            (ApiKey::Fetch, ApiVersion(1)),
            (ApiKey::ListOffsets, ApiVersion(0)),
            (ApiKey::Metadata, ApiVersion(0)),
            (ApiKey::OffsetCommit, ApiVersion(2)),
            (ApiKey::OffsetFetch, ApiVersion(1)),
            (ApiKey::FindCoordinator, ApiVersion(0)),
            (ApiKey::JoinGroup, ApiVersion(0)),
            (ApiKey::Heartbeat, ApiVersion(0)),
            (ApiKey::LeaveGroup, ApiVersion(0)),
            (ApiKey::SyncGroup, ApiVersion(0)),
            (ApiKey::DescribeGroups, ApiVersion(0)),
            (ApiKey::ListGroups, ApiVersion(0)),
        ]);

        if version >= KafkaVersion::V0_10_0 {
            versions.insert(ApiKey::Produce, ApiVersion(2));
            versions.insert(ApiKey::Fetch, ApiVersion(2));
            versions.insert(ApiKey::ApiVersions, ApiVersion(0));
        }
        if version >= KafkaVersion::V0_10_1 {
            versions.insert(ApiKey::Fetch, ApiVersion(3));
            versions.insert(ApiKey::ListOffsets, ApiVersion(1));
        }

        Self { versions }
    }

    /// The versions a broker negotiated, clamped to what we can speak.
    pub fn negotiated(defaults: &Self, response: &ApiVersionsResponse) -> Self {
        let versions = response
            .api_keys
            .iter()
            .filter_map(|range| {
                let key = ApiKey::from(range.api_key);
                let ours = defaults.get(key)?;
                let version = ours.0.min(range.max_version);
                (version >= range.min_version).then_some((key, ApiVersion(version)))
            })
            .collect();

        Self { versions }
    }

    pub fn get(&self, key: ApiKey) -> Option<ApiVersion> {
        self.versions.get(&key).copied()
    }
}
