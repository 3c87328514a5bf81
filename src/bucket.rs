//! Bucket operations.
//!
//! Every DeviceDB node exposes the same set of buckets (see [`BucketName`]). The [`KvBucket`]
//! trait holds the operations common to node buckets ([`Bucket`]) and cluster site buckets
//! ([`SiteBucket`]).
//!
//! [`SiteBucket`]: ../cluster/struct.SiteBucket.html
use std::io::BufReader;

use reqwest::Method;
use serde_json::Value;

use crate::error::Result;
use crate::model::{BatchOp, BucketName, DbObject, MatchRecord};
use crate::sibling::RawDbObject;
use crate::stream::{pump, MatchParser};
use crate::transport::Transport;

/// A trait for the key/value operations of a bucket
pub trait KvBucket {
    /// applies every operation of `ops` in a single request
    fn batch(&self, ops: &[BatchOp]) -> Result<()>;

    /// gets the objects stored under `keys`.
    ///
    /// The result has one entry per key, in request order; `None` marks a key with no value
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<DbObject>>>;

    /// passes every key starting with one of `prefixes` to `next`.
    ///
    /// Returns the number of records delivered
    fn get_matches_many(
        &self,
        prefixes: &[&str],
        next: &mut dyn FnMut(Result<MatchRecord>),
    ) -> Result<usize>;

    /// sets `key` to `value`. `context` comes from a previous read of the key
    fn put(&self, key: &str, value: &str, context: Option<&str>) -> Result<()> {
        self.batch(&[BatchOp::put(key, value, context)])
    }

    /// deletes `key`. `context` comes from a previous read of the key
    fn delete(&self, key: &str, context: Option<&str>) -> Result<()> {
        self.batch(&[BatchOp::delete(key, context)])
    }

    /// gets the object stored under `key`
    ///
    /// returns `Ok(None)` if there is no value associated with the key
    fn get(&self, key: &str) -> Result<Option<DbObject>> {
        Ok(self.get_many(&[key])?.into_iter().next().flatten())
    }

    /// passes every key starting with `prefix` to `next`
    fn get_matches(
        &self,
        prefix: &str,
        next: &mut dyn FnMut(Result<MatchRecord>),
    ) -> Result<usize> {
        self.get_matches_many(&[prefix], next)
    }
}

/// A bucket of a single DeviceDB node
#[derive(Debug, Clone)]
pub struct Bucket {
    name: BucketName,
    transport: Transport,
}

impl Bucket {
    pub(crate) fn new(name: BucketName, transport: Transport) -> Self {
        Bucket { name, transport }
    }

    /// the name of this bucket
    pub fn name(&self) -> BucketName {
        self.name
    }

    /// gets the root hash of this bucket's merkle tree
    pub fn merkle_root(&self) -> Result<Value> {
        let url = self.transport.endpoint(&[self.name.as_str(), "merkleRoot"])?;
        self.transport.call_json(self.transport.request(Method::GET, url))
    }
}

impl KvBucket for Bucket {
    fn batch(&self, ops: &[BatchOp]) -> Result<()> {
        let url = self.transport.endpoint(&[self.name.as_str(), "batch"])?;
        self.transport.call(self.transport.request(Method::POST, url).json(ops))
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<DbObject>>> {
        let url = self.transport.endpoint(&[self.name.as_str(), "values"])?;
        let objects: Vec<Option<RawDbObject>> =
            self.transport.call_json(self.transport.request(Method::POST, url).json(keys))?;

        Ok(objects
            .into_iter()
            .map(|object| object.and_then(RawDbObject::into_db_object))
            .collect())
    }

    fn get_matches_many(
        &self,
        prefixes: &[&str],
        next: &mut dyn FnMut(Result<MatchRecord>),
    ) -> Result<usize> {
        let url = self.transport.endpoint(&[self.name.as_str(), "matches"])?;
        let response =
            self.transport.execute(self.transport.request(Method::POST, url).json(prefixes))?;

        Ok(pump(BufReader::new(response), MatchParser::default(), next))
    }
}
