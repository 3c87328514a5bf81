//! The cluster (cloud) side of DeviceDB.
//!
//! A [`ClusterClient`] manages the topology of a DeviceDB cluster (sites and the relays assigned
//! to them) and reads or writes the buckets of a given site. Every request is sent to one of the
//! configured cluster nodes, chosen at random.
use reqwest::Method;
use serde::Serialize;

use crate::bucket::KvBucket;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::model::{BatchOp, BucketName, DbObject, MatchRecord};
use crate::sibling::RawDbObject;
use crate::transport::Transport;

#[derive(Serialize)]
struct MoveRelay<'a> {
    site: &'a str,
}

/// `ClusterClient` talks to the REST API of a DeviceDB cluster
#[derive(Debug, Clone)]
pub struct ClusterClient {
    transport: Transport,
}

impl ClusterClient {
    /// creates a client for the cluster nodes configured in `config`
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(ClusterClient { transport: Transport::new(&config)? })
    }

    /// creates a client for the cluster nodes at `uris` with the default configuration
    pub fn connect<I, S>(uris: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(ClientConfig::cluster(uris)?)
    }

    /// registers the relay `relay_id` with the cluster
    pub fn add_relay(&self, relay_id: &str) -> Result<()> {
        self.topology(Method::PUT, "relays", relay_id)
    }

    /// removes the relay `relay_id` from the cluster
    pub fn remove_relay(&self, relay_id: &str) -> Result<()> {
        self.topology(Method::DELETE, "relays", relay_id)
    }

    /// assigns the relay `relay_id` to the site `site_id`
    pub fn move_relay(&self, relay_id: &str, site_id: &str) -> Result<()> {
        let url = self.transport.endpoint(&["relays", relay_id])?;
        let body = MoveRelay { site: site_id };
        self.transport.call(self.transport.request(Method::PATCH, url).json(&body))
    }

    /// creates the site `site_id`
    pub fn add_site(&self, site_id: &str) -> Result<()> {
        self.topology(Method::PUT, "sites", site_id)
    }

    /// removes the site `site_id`
    pub fn remove_site(&self, site_id: &str) -> Result<()> {
        self.topology(Method::DELETE, "sites", site_id)
    }

    /// a handle on the buckets of the site `site_id`. No request is made
    pub fn site(&self, site_id: &str) -> Site {
        Site::new(site_id, self.transport.clone())
    }

    fn topology(&self, method: Method, kind: &str, id: &str) -> Result<()> {
        let url = self.transport.endpoint(&[kind, id])?;
        self.transport.call(self.transport.request(method, url))
    }
}

/// The buckets of one site of a cluster.
/// The key/value methods on the site itself operate on its `default` bucket
#[derive(Debug, Clone)]
pub struct Site {
    id: String,
    default: SiteBucket,
    lww: SiteBucket,
    cloud: SiteBucket,
    local: SiteBucket,
}

impl Site {
    fn new(id: &str, transport: Transport) -> Self {
        let bucket = |name: BucketName| SiteBucket {
            site_id: id.to_string(),
            name,
            transport: transport.clone(),
        };
        Site {
            id: id.to_string(),
            default: bucket(BucketName::Default),
            lww: bucket(BucketName::Lww),
            cloud: bucket(BucketName::Cloud),
            local: bucket(BucketName::Local),
        }
    }

    /// the site identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// the bucket called `name`
    pub fn bucket(&self, name: BucketName) -> &SiteBucket {
        match name {
            BucketName::Default => &self.default,
            BucketName::Lww => &self.lww,
            BucketName::Cloud => &self.cloud,
            BucketName::Local => &self.local,
        }
    }

    /// the `default` bucket
    pub fn default_bucket(&self) -> &SiteBucket {
        &self.default
    }

    /// the `default` bucket, under its other name
    pub fn shared(&self) -> &SiteBucket {
        &self.default
    }

    /// the last-writer-wins bucket
    pub fn lww(&self) -> &SiteBucket {
        &self.lww
    }

    /// the `cloud` bucket
    pub fn cloud(&self) -> &SiteBucket {
        &self.cloud
    }

    /// the node-local bucket
    pub fn local(&self) -> &SiteBucket {
        &self.local
    }

    /// sets `key` to `value` in the `default` bucket
    pub fn put(&self, key: &str, value: &str, context: Option<&str>) -> Result<()> {
        self.default.put(key, value, context)
    }

    /// deletes `key` from the `default` bucket
    pub fn delete(&self, key: &str, context: Option<&str>) -> Result<()> {
        self.default.delete(key, context)
    }

    /// applies `ops` to the `default` bucket
    pub fn batch(&self, ops: &[BatchOp]) -> Result<()> {
        self.default.batch(ops)
    }

    /// gets `key` from the `default` bucket
    pub fn get(&self, key: &str) -> Result<Option<DbObject>> {
        self.default.get(key)
    }

    /// gets several keys from the `default` bucket
    pub fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<DbObject>>> {
        self.default.get_many(keys)
    }

    /// passes the keys of the `default` bucket starting with `prefix` to `next`
    pub fn get_matches<F>(&self, prefix: &str, mut next: F) -> Result<usize>
    where
        F: FnMut(Result<MatchRecord>),
    {
        self.default.get_matches(prefix, &mut next)
    }

    /// passes the keys of the `default` bucket starting with any of `prefixes` to `next`
    pub fn get_matches_many<F>(&self, prefixes: &[&str], mut next: F) -> Result<usize>
    where
        F: FnMut(Result<MatchRecord>),
    {
        self.default.get_matches_many(prefixes, &mut next)
    }
}

/// A bucket of one site of a cluster
#[derive(Debug, Clone)]
pub struct SiteBucket {
    site_id: String,
    name: BucketName,
    transport: Transport,
}

impl SiteBucket {
    /// the name of this bucket
    pub fn name(&self) -> BucketName {
        self.name
    }

    /// the site this bucket belongs to
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    fn keys(&self, param: &str, values: &[&str]) -> Result<Vec<Option<RawDbObject>>> {
        let pairs: Vec<(&str, &str)> = values.iter().map(|value| (param, *value)).collect();
        let url = self.transport.endpoint_with_query(
            &["sites", self.site_id.as_str(), "buckets", self.name.as_str(), "keys"],
            &pairs,
        )?;
        self.transport.call_json(self.transport.request(Method::GET, url))
    }
}

impl KvBucket for SiteBucket {
    fn batch(&self, ops: &[BatchOp]) -> Result<()> {
        let url = self.transport.endpoint(&[
            "sites",
            self.site_id.as_str(),
            "buckets",
            self.name.as_str(),
            "batches",
        ])?;
        self.transport.call(self.transport.request(Method::POST, url).json(ops))
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<DbObject>>> {
        Ok(self
            .keys("key", keys)?
            .into_iter()
            .map(|object| object.and_then(RawDbObject::into_db_object))
            .collect())
    }

    fn get_matches_many(
        &self,
        prefixes: &[&str],
        next: &mut dyn FnMut(Result<MatchRecord>),
    ) -> Result<usize> {
        let records: Vec<MatchRecord> = self
            .keys("prefix", prefixes)?
            .into_iter()
            .flatten()
            .map(RawDbObject::into_match_record)
            .collect();

        let delivered = records.len();
        for record in records {
            next(Ok(record));
        }
        Ok(delivered)
    }
}
