use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Stable identifier for an individual capability entry.
///
/// The id is the join key between the catalog and the aggregator's status
/// map, so it must be unique within a catalog.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityId(pub String);

impl CapabilityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CapabilityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Tri-state outcome of a capability probe.
///
/// Every capability starts `Pending` and moves to exactly one terminal value
/// when its probe settles. `is_terminal` is the guard the aggregator uses to
/// drop repeated settlements.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CapabilityStatus {
    Pending,
    Supported,
    Unsupported,
}

impl CapabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityStatus::Pending => "pending",
            CapabilityStatus::Supported => "supported",
            CapabilityStatus::Unsupported => "unsupported",
        }
    }

    /// Map a probe's boolean answer onto a terminal status.
    pub fn from_outcome(present: bool) -> Self {
        if present {
            CapabilityStatus::Supported
        } else {
            CapabilityStatus::Unsupported
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, CapabilityStatus::Pending)
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(CapabilityStatus::Pending),
            "supported" => Some(CapabilityStatus::Supported),
            "unsupported" => Some(CapabilityStatus::Unsupported),
            _ => None,
        }
    }
}

impl fmt::Display for CapabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CapabilityStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CapabilityStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::from_str(&value).ok_or_else(|| {
            serde::de::Error::unknown_variant(&value, &["pending", "supported", "unsupported"])
        })
    }
}
