//! Generic storage records.
//!
//! The store never interprets `payload` or `metadata`; it only partitions
//! records by tenant and kind.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::storage::new_record_id;

/// Record families kept by the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Subscription,
    Journal,
    Preference,
    Generic,
}

impl RecordKind {
    pub const ALL: [Self; 4] = [
        Self::Subscription,
        Self::Journal,
        Self::Preference,
        Self::Generic,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Journal => "journal",
            Self::Preference => "preference",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tenant-scoped record with opaque payload and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRecord {
    pub id: String,
    pub tenant_id: String,
    pub kind: RecordKind,
    pub payload: Value,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StorageRecord {
    /// New record with a fresh id and both timestamps set to now.
    pub fn new(tenant_id: impl Into<String>, kind: RecordKind, payload: Value) -> Self {
        let now = Utc::now();
        Self {
            id: new_record_id(),
            tenant_id: tenant_id.into(),
            kind,
            payload,
            metadata: Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
