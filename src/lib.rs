#![deny(missing_docs)]
//! A client for the REST API of DeviceDB, a distributed key/value store for edge devices.
//!
//! This crate provides the [`DeviceDbClient`] for talking to a single DeviceDB node, the
//! [`ClusterClient`] for managing a DeviceDB cluster, as well as a [`devicedb-shell`]
//! executable that can be used to explore a node or cluster by hand.
//! All calls are blocking: every method sends one HTTP request and returns once the response
//! has been received (or streamed through a callback).
//!
//! ## Buckets
//! Every node keeps its keys in four buckets, see [`BucketName`]. The key/value operations:
//!
//! - `put` a value under a key
//! - `delete` a key
//! - `batch` several puts and deletes into one request
//! - `get` the values of one or more keys
//! - `get_matches` streams every key starting with a prefix
//!
//! are described by the [`KvBucket`] trait, implemented by node buckets ([`Bucket`]) and by the
//! buckets of a cluster site ([`SiteBucket`]).
//!
//! ## Siblings
//! DeviceDB does not silently drop concurrent writes. A read returns a [`DbObject`] holding every
//! "sibling" version of the key. If there is exactly one sibling it is also exposed as
//! [`DbObject::value`]; otherwise `value` is `None` and the application decides what the value
//! should be, passing the object's `context` back with its next write to the key.
//!
//! ## Events and alerts
//! The [`History`] of a node is an append-only event log that can be queried and purged. Query
//! results are streamed one event per line. The [`AlertLog`] records named alerts being raised
//! and lowered in the same log under the `alerts` category.
//!
//! ## Errors
//! Every operation returns a [`Result`]. Network failures surface as
//! [`DeviceDbError::Transport`], any status other than `200 OK` as [`DeviceDbError::Protocol`]
//! carrying the response body, and invalid input as [`DeviceDbError::Validation`] before any
//! request is sent. Nothing is retried.
//!
//! ## Example
//! ```no_run
//! use devicedb::{DeviceDbClient, KvBucket};
//! # fn main() -> devicedb::Result<()> {
//! let client = DeviceDbClient::connect("http://127.0.0.1:9090")?;
//! client.put("greeting", "hello", None)?;
//! if let Some(object) = client.get("greeting")? {
//!     println!("{:?} (context {})", object.value, object.context);
//! }
//! client.lww().put("counter", "1", None)?;
//! # Ok(())
//! # }
//! ```
//!
//! [`devicedb-shell`]: ./shell/index.html

pub use bucket::{Bucket, KvBucket};
pub use client::{DeviceDbClient, DEFAULT_PEER_PORT};
pub use cluster::{ClusterClient, Site, SiteBucket};
pub use config::{ClientConfig, MAX_IDLE_CONNECTIONS};
pub use error::{DeviceDbError, Result};
pub use history::{AlertLog, History, ALERTS_CATEGORY, EVENTS_CATEGORY};
pub use keys::{decode_key, encode_key};
pub use model::{
    BatchOp, BatchOpType, BucketName, DbObject, Event, HistoryQuery, MatchRecord, Peer, PurgeQuery,
    SortOrder,
};
pub use sibling::resolve_value;

mod bucket;
mod client;
mod cluster;
mod config;
mod error;
mod history;
mod keys;
mod model;
pub mod shell;
mod sibling;
pub mod stream;
mod transport;
