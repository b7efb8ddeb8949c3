//! Target identifiers used to address transports and stores.
//!
//! ```text
//! wrpc+<scheme>://<authority>[;<bucket>]   network transport, optional bucket
//! <url>                                    transport with its own scheme
//! (empty)                                  in-process default
//! ```
//!
//! ```
//! use wrpc_wire::target::Target;
//!
//! let target = Target::parse("wrpc+nats://localhost:4222;cache").unwrap();
//! assert_eq!(
//!     target,
//!     Target::Wrpc {
//!         scheme: "nats".into(),
//!         authority: "localhost:4222".into(),
//!         bucket: Some("cache".into()),
//!     }
//! );
//! assert_eq!(target.to_string(), "wrpc+nats://localhost:4222;cache");
//! ```

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Result, WireError};

const WRPC_SCHEME_PREFIX: &str = "wrpc+";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Empty identifier.
    Local,
    /// `wrpc+<scheme>://<authority>[;<bucket>]`
    Wrpc {
        scheme: String,
        authority: String,
        bucket: Option<String>,
    },
    /// Any other URL.
    Url(Url),
}

impl Target {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Target::Local);
        }
        let invalid = |why: &str| WireError::InvalidTarget(format!("`{s}`: {why}"));

        let Some(rest) = s.strip_prefix(WRPC_SCHEME_PREFIX) else {
            return Url::parse(s)
                .map(Target::Url)
                .map_err(|e| invalid(&e.to_string()));
        };

        let (scheme, rest) = rest.split_once("://").ok_or_else(|| invalid("missing `://`"))?;
        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(invalid("invalid scheme"));
        }
        let (authority, bucket) = match rest.split_once(';') {
            Some((_, "")) => return Err(invalid("empty bucket")),
            Some((authority, bucket)) => (authority, Some(bucket.to_string())),
            None => (rest, None),
        };
        if authority.is_empty() {
            return Err(invalid("empty authority"));
        }
        Ok(Target::Wrpc {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
            bucket,
        })
    }

    /// Transport scheme: `tcp`, `nats`, `unix`, `quic`, or the URL scheme.
    pub fn scheme(&self) -> Option<&str> {
        match self {
            Target::Local => None,
            Target::Wrpc { scheme, .. } => Some(scheme),
            Target::Url(url) => Some(url.scheme()),
        }
    }

    pub fn bucket(&self) -> Option<&str> {
        match self {
            Target::Wrpc { bucket, .. } => bucket.as_deref(),
            _ => None,
        }
    }
}

impl FromStr for Target {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Local => Ok(()),
            Target::Wrpc {
                scheme,
                authority,
                bucket,
            } => {
                write!(f, "{WRPC_SCHEME_PREFIX}{scheme}://{authority}")?;
                if let Some(bucket) = bucket {
                    write!(f, ";{bucket}")?;
                }
                Ok(())
            }
            Target::Url(url) => write!(f, "{url}"),
        }
    }
}
