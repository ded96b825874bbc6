//! Broker URI parsing.
//!
//! Accepted shape is `(scheme://)?host(:port)?` with scheme `kafka` or `tcp`
//! and default port 9092; the canonical form is always `kafka://host:port`.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 9092;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid broker URI: {0}")]
pub struct InvalidUri(pub String);

/// A canonicalized bootstrap broker address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrokerUri {
    pub host: String,
    pub port: u16,
}

impl BrokerUri {
    pub fn parse(input: &str) -> Result<Self, InvalidUri> {
        let rest = match input.split_once("://") {
            Some(("kafka" | "tcp", rest)) => rest,
            Some(_) => return Err(InvalidUri(input.to_owned())),
            None => input,
        };

        let (host, port) = match rest.split_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| InvalidUri(input.to_owned()))?;
                (host, port)
            }
            None => (rest, DEFAULT_PORT),
        };

        if host.is_empty()
            || !host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return Err(InvalidUri(input.to_owned()));
        }

        Ok(Self {
            host: host.to_owned(),
            port,
        })
    }
}

impl FromStr for BrokerUri {
    type Err = InvalidUri;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for BrokerUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "kafka://{}:{}", self.host, self.port)
    }
}
