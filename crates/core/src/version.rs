// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler version type with component-wise numeric ordering.
//!
//! Handler versions are dotted numeric sequences of arbitrary arity
//! (`1`, `1.2`, `1.2.0.4`). Ordering compares components numerically with
//! missing trailing components reading as zero, so `1.2` equals `1.2.0`
//! and `1.10` sorts after `1.9`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors from parsing a version or version spec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,
    #[error("invalid version component `{component}` in `{version}`")]
    InvalidComponent { version: String, component: String },
    #[error("wildcard must be the final component in `{spec}`")]
    MisplacedWildcard { spec: String },
}

/// A dotted numeric handler version.
#[derive(Debug, Clone)]
pub struct HandlerVersion {
    components: Vec<u64>,
}

impl HandlerVersion {
    /// Parse a version string, rejecting empty or non-numeric components.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        if s.is_empty() {
            return Err(VersionError::Empty);
        }
        let mut components = Vec::new();
        for part in s.split('.') {
            let n = part.parse::<u64>().map_err(|_| VersionError::InvalidComponent {
                version: s.to_string(),
                component: part.to_string(),
            })?;
            components.push(n);
        }
        Ok(Self { components })
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// Components with trailing zeros removed (the canonical form used for
    /// equality and hashing).
    fn trimmed(&self) -> &[u64] {
        let mut end = self.components.len();
        while end > 1 && self.components[end - 1] == 0 {
            end -= 1;
        }
        &self.components[..end]
    }
}

impl FromStr for HandlerVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for HandlerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for c in &self.components {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{c}")?;
            first = false;
        }
        Ok(())
    }
}

impl PartialEq for HandlerVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HandlerVersion {}

impl std::hash::Hash for HandlerVersion {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.trimmed().hash(state);
    }
}

impl Ord for HandlerVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for HandlerVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A goal-state requested version: either an exact version or a version
/// family with a trailing wildcard (`1.2.*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    Exact(HandlerVersion),
    Family(Vec<u64>),
}

impl VersionSpec {
    /// Parse a requested version. A final `*` component turns the spec into
    /// a family match; a `*` anywhere else is rejected.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        if s.is_empty() {
            return Err(VersionError::Empty);
        }
        if !s.contains('*') {
            return Ok(Self::Exact(HandlerVersion::parse(s)?));
        }

        let parts: Vec<&str> = s.split('.').collect();
        let (last, prefix) = match parts.split_last() {
            Some(split) => split,
            None => return Err(VersionError::Empty),
        };
        if *last != "*" || prefix.iter().any(|p| p.contains('*')) {
            return Err(VersionError::MisplacedWildcard { spec: s.to_string() });
        }

        let mut components = Vec::with_capacity(prefix.len());
        for part in prefix {
            let n = part.parse::<u64>().map_err(|_| VersionError::InvalidComponent {
                version: s.to_string(),
                component: (*part).to_string(),
            })?;
            components.push(n);
        }
        Ok(Self::Family(components))
    }

    /// Whether the given version satisfies this spec.
    ///
    /// Exact specs match by version equality (`1.2` matches `1.2.0`).
    /// Family specs match any version whose leading components equal the
    /// prefix (`1.2.*` matches `1.2`, `1.2.0`, and `1.2.9.9`).
    pub fn matches(&self, version: &HandlerVersion) -> bool {
        match self {
            Self::Exact(v) => v == version,
            Self::Family(prefix) => {
                prefix.iter().enumerate().all(|(i, p)| {
                    version.components().get(i).copied().unwrap_or(0) == *p
                })
            }
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => v.fmt(f),
            Self::Family(prefix) => {
                for p in prefix {
                    write!(f, "{p}.")?;
                }
                f.write_str("*")
            }
        }
    }
}

#[cfg(test)]
#[path = "version_tests.rs"]
mod tests;
