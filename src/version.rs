//! Loose version numbers as advertised by the target ("3.4.36", "5.4.0-DEV").

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Capability version used to gate modules.
///
/// Numeric components compare numerically and missing ones count as zero,
/// so `4` == `4.0.0`. Anything after the first non-numeric component is kept
/// for display only.
#[derive(Debug, Clone, Default)]
pub struct Version {
    parts: Vec<u64>,
    raw: String,
}

impl Version {
    /// Unknown version, lower than anything real.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let mut parts = Vec::new();
        for piece in raw.split(['.', '-', '+', ' ']) {
            match piece.parse::<u64>() {
                Ok(n) => parts.push(n),
                Err(_) => break,
            }
        }
        Self {
            parts,
            raw: raw.to_string(),
        }
    }

    pub fn is_known(&self) -> bool {
        !self.parts.is_empty()
    }

    pub fn major(&self) -> u64 {
        self.component(0)
    }

    fn component(&self, index: usize) -> u64 {
        self.parts.get(index).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Version {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            f.write_str("unknown")
        } else {
            f.write_str(&self.raw)
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
