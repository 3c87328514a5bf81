use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DeviceDbError, Result};

/// A value read back from a bucket.
///
/// `siblings` holds every concurrent version the server kept for the key. When there is exactly
/// one sibling it is copied into `value`, otherwise `value` is `None` and the caller must resolve
/// the conflict itself, passing `context` back on the next write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbObject {
    /// all sibling values for the key
    pub siblings: Vec<String>,
    /// the resolved value, if the key is not in conflict
    pub value: Option<String>,
    /// opaque causality token to pass back on the next write
    pub context: String,
}

/// One result of a prefix match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// the prefix that matched
    pub prefix: String,
    /// the full key
    pub key: String,
    /// all sibling values for the key
    pub siblings: Vec<String>,
    /// the resolved value, if the key is not in conflict
    pub value: Option<String>,
    /// opaque causality token to pass back on the next write
    pub context: String,
}

/// the kind of a [`BatchOp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOpType {
    /// write a value
    Put,
    /// delete a key
    Delete,
}

/// A single write within a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOp {
    /// put or delete
    #[serde(rename = "type")]
    pub op: BatchOpType,
    /// the key to write
    pub key: String,
    /// the value, only present for puts
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
    /// context from a previous read, or the empty string
    #[serde(default)]
    pub context: String,
}

impl BatchOp {
    /// builds a put operation. A missing context is sent as the empty string
    pub fn put(key: impl Into<String>, value: impl Into<String>, context: Option<&str>) -> Self {
        BatchOp {
            op: BatchOpType::Put,
            key: key.into(),
            value: Some(value.into()),
            context: context.unwrap_or_default().to_string(),
        }
    }

    /// builds a delete operation. A missing context is sent as the empty string
    pub fn delete(key: impl Into<String>, context: Option<&str>) -> Self {
        BatchOp {
            op: BatchOpType::Delete,
            key: key.into(),
            value: None,
            context: context.unwrap_or_default().to_string(),
        }
    }
}

/// An entry in the event (history) log.
///
/// `timestamp`, `uuid` and `serial` are assigned by the server and are only present on
/// events read back through a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// who produced the event
    pub source: String,
    /// the event type
    #[serde(rename = "type")]
    pub event_type: String,
    /// arbitrary JSON payload
    #[serde(default)]
    pub data: Value,
    /// groups the event belongs to
    #[serde(default)]
    pub groups: Vec<String>,
    /// server-side timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// server-side identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// server-side sequence number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<u64>,
}

impl Event {
    /// creates an event with no groups
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: Value) -> Self {
        Event {
            source: source.into(),
            event_type: event_type.into(),
            data,
            groups: Vec::new(),
            timestamp: None,
            uuid: None,
            serial: None,
        }
    }

    /// adds the event to `groups`
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

/// A replication peer of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// the peer identifier
    pub id: String,
    /// the peer's host name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// the peer's port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// sort order of a history query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// oldest first
    Asc,
    /// newest first
    Desc,
}

impl SortOrder {
    fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Filters for a history query. Unset fields are left out of the query string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryQuery {
    /// only events from these sources
    pub sources: Vec<String>,
    /// maximum number of events returned
    pub limit: Option<u64>,
    /// order of the results
    pub sort_order: Option<SortOrder>,
    /// only events whose data matches
    pub data: Option<String>,
    /// only events younger than this many milliseconds
    pub max_age: Option<u64>,
    /// only events after this timestamp
    pub after_time: Option<u64>,
    /// only events before this timestamp
    pub before_time: Option<u64>,
}

impl HistoryQuery {
    /// the query pairs in the order the server expects them
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs: Vec<(&'static str, String)> =
            self.sources.iter().map(|s| ("source", s.clone())).collect();

        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(order) = self.sort_order {
            pairs.push(("sortOrder", order.as_str().to_string()));
        }
        if let Some(data) = &self.data {
            pairs.push(("data", data.clone()));
        }
        push_time_window(&mut pairs, self.max_age, self.after_time, self.before_time);
        pairs
    }
}

/// Filters for purging the history log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurgeQuery {
    /// purge events older than this many milliseconds
    pub max_age: Option<u64>,
    /// purge events after this timestamp
    pub after_time: Option<u64>,
    /// purge events before this timestamp
    pub before_time: Option<u64>,
}

impl PurgeQuery {
    /// the query pairs in the order the server expects them
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_time_window(&mut pairs, self.max_age, self.after_time, self.before_time);
        pairs
    }
}

fn push_time_window(
    pairs: &mut Vec<(&'static str, String)>,
    max_age: Option<u64>,
    after_time: Option<u64>,
    before_time: Option<u64>,
) {
    if let Some(v) = max_age {
        pairs.push(("maxAge", v.to_string()));
    }
    if let Some(v) = after_time {
        pairs.push(("afterTime", v.to_string()));
    }
    if let Some(v) = before_time {
        pairs.push(("beforeTime", v.to_string()));
    }
}

/// The buckets every DeviceDB node (and every cluster site) exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketName {
    /// the shared bucket, replicated with conflict detection
    Default,
    /// last-writer-wins bucket
    Lww,
    /// bucket written by the cloud
    Cloud,
    /// node-local bucket, never replicated
    Local,
}

impl BucketName {
    /// the name used in request paths
    pub fn as_str(self) -> &'static str {
        match self {
            BucketName::Default => "default",
            BucketName::Lww => "lww",
            BucketName::Cloud => "cloud",
            BucketName::Local => "local",
        }
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BucketName {
    type Err = DeviceDbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" | "shared" => Ok(BucketName::Default),
            "lww" => Ok(BucketName::Lww),
            "cloud" => Ok(BucketName::Cloud),
            "local" => Ok(BucketName::Local),
            other => Err(DeviceDbError::validation(format!("unknown bucket: {}", other))),
        }
    }
}
