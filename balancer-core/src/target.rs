use std::fmt::{Display, Formatter};
use std::str::FromStr;

use url::Url;

use crate::error::Error;

/// A dial target of the form `scheme://authority[/endpoint]`.
///
/// The scheme selects the resolver and picker registered for it, the
/// authority is the bootstrap address the resolver dials.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Target {
    scheme: String,
    authority: String,
    endpoint: String,
}

impl Target {
    pub fn new(scheme: impl Into<String>, authority: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            authority: authority.into(),
            endpoint: String::new(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| Error::InvalidTarget { target: s.to_string(), reason: reason.to_string() };
        let url = Url::parse(s).map_err(|e| invalid(&e.to_string()))?;
        let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(|| invalid("missing authority"))?;
        let authority = match url.port() {
            None => host.to_string(),
            Some(port) => format!("{}:{}", host, port),
        };
        let endpoint = url.path().trim_start_matches('/').to_string();
        Ok(Self {
            scheme: url.scheme().to_string(),
            authority,
            endpoint,
        })
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)?;
        if !self.endpoint.is_empty() {
            write!(f, "/{}", self.endpoint)?;
        }
        Ok(())
    }
}
