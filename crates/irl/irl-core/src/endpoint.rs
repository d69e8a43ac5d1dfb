use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};

/// How a client turns its configured base URL into the verify endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointMode {
    /// The configured URL is the verify endpoint and is used verbatim.
    /// The integration travels only in the `x-irl-integration` header.
    Fixed,
    /// `{base_url}/verify/{integration}`, trailing slash on the base stripped.
    #[default]
    Templated,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid endpoint mode '{0}'. Valid values are: fixed, templated")]
pub struct ParseEndpointModeError(pub String);

impl FromStr for EndpointMode {
    type Err = ParseEndpointModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(EndpointMode::Fixed),
            "templated" => Ok(EndpointMode::Templated),
            _ => Err(ParseEndpointModeError(s.to_string())),
        }
    }
}

impl fmt::Display for EndpointMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointMode::Fixed => write!(f, "fixed"),
            EndpointMode::Templated => write!(f, "templated"),
        }
    }
}
