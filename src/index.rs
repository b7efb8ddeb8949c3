//! Structural addressing of nested async positions.
//!
//! An [`Index`] is the path from the root of a call's parameters (or results)
//! to a nested position: record field order, tuple position, variant arm
//! order and list/stream element order, concatenated outermost first.
//! The empty index is the root channel carrying the synchronous encoding.
//!
//! ```
//! use wrpc_wire::Index;
//!
//! // field 0 of parameter 0
//! let index = Index::root().child(0).unwrap().child(0).unwrap();
//! assert_eq!(index.as_slice(), &[0, 0]);
//! assert_eq!(index.subject_suffix(), "0.0");
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, WireError};

/// Maximum index length accepted on the wire or produced by the encoder.
pub const MAX_INDEX_DEPTH: usize = 32;

/// Immutable path of `u32` components.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Index(Arc<[u32]>);

/// Static description of an index family: `None` matches any list or stream
/// element.
pub type IndexPattern = Vec<Option<u32>>;

impl Index {
    /// The root index.
    pub fn root() -> Self {
        Self(Arc::from([]))
    }

    /// Build an index from components, enforcing the depth limit.
    pub fn new(path: impl Into<Vec<u32>>) -> Result<Self> {
        let path = path.into();
        check_depth(path.len())?;
        Ok(Self(path.into()))
    }

    /// Index of the `i`-th child of this position.
    pub fn child(&self, i: u32) -> Result<Self> {
        check_depth(self.0.len() + 1)?;
        let mut path = Vec::with_capacity(self.0.len() + 1);
        path.extend_from_slice(&self.0);
        path.push(i);
        Ok(Self(path.into()))
    }

    /// Concatenate `rest` below this index.
    pub fn join(&self, rest: &[u32]) -> Result<Self> {
        check_depth(self.0.len() + rest.len())?;
        let mut path = Vec::with_capacity(self.0.len() + rest.len());
        path.extend_from_slice(&self.0);
        path.extend_from_slice(rest);
        Ok(Self(path.into()))
    }

    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Components joined with `.`, as used in subject names.
    pub fn subject_suffix(&self) -> String {
        let mut out = String::new();
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(&c.to_string());
        }
        out
    }

    /// Parse a `.`-joined suffix back into an index. Empty string is root.
    pub fn parse_subject_suffix(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let path = s
            .split('.')
            .map(|token| {
                token
                    .parse::<u32>()
                    .map_err(|_| WireError::Malformed(format!("invalid index component `{token}`")))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(path)
    }

    /// Whether this index belongs to the family described by `pattern`.
    pub fn matches(&self, pattern: &[Option<u32>]) -> bool {
        self.0.len() == pattern.len()
            && self
                .0
                .iter()
                .zip(pattern)
                .all(|(c, p)| p.map_or(true, |p| p == *c))
    }

    /// Whether this index is `pattern` or lies below it.
    pub fn starts_with(&self, prefix: &[u32]) -> bool {
        self.0.starts_with(prefix)
    }
}

fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_INDEX_DEPTH {
        return Err(WireError::IndexTooDeep {
            depth,
            max: MAX_INDEX_DEPTH,
        });
    }
    Ok(())
}

/// Whether `index` matches any of `patterns`.
pub fn matches_any(index: &Index, patterns: &[IndexPattern]) -> bool {
    patterns.iter().any(|p| index.matches(p))
}

impl Default for Index {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index({:?})", &self.0[..])
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "]")
    }
}

impl AsRef<[u32]> for Index {
    fn as_ref(&self) -> &[u32] {
        &self.0
    }
}

impl TryFrom<&[u32]> for Index {
    type Error = WireError;

    fn try_from(path: &[u32]) -> Result<Self> {
        Self::new(path.to_vec())
    }
}

impl<const N: usize> TryFrom<[u32; N]> for Index {
    type Error = WireError;

    fn try_from(path: [u32; N]) -> Result<Self> {
        Self::new(path.to_vec())
    }
}
