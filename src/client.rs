use reqwest::{Method, Url};
use serde_json::Value;

use crate::bucket::{Bucket, KvBucket};
use crate::config::ClientConfig;
use crate::error::{DeviceDbError, Result};
use crate::history::{AlertLog, History, EVENTS_CATEGORY};
use crate::model::{BatchOp, BucketName, DbObject, MatchRecord, Peer};
use crate::transport::Transport;

/// the port assumed for a peer whose address does not name one
pub const DEFAULT_PEER_PORT: u16 = 443;

/// `DeviceDbClient` talks to the REST API of a single DeviceDB node.
///
/// The key/value methods on the client itself operate on the `default` bucket; the other buckets
/// are reached through [`DeviceDbClient::bucket`] or the named accessors. Clones share the
/// same connection pool.
#[derive(Debug, Clone)]
pub struct DeviceDbClient {
    transport: Transport,
    default: Bucket,
    lww: Bucket,
    cloud: Bucket,
    local: Bucket,
    history: History,
    alerts: AlertLog,
}

impl DeviceDbClient {
    /// creates a client for the node configured in `config`
    /// # Errors
    /// `DeviceDbError::InvalidUri` if `config` names more than one server
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.uris().len() != 1 {
            return Err(DeviceDbError::InvalidUri(
                "a node client needs exactly one uri, use a ClusterClient for several".to_string(),
            ));
        }
        let transport = Transport::new(&config)?;

        Ok(DeviceDbClient {
            default: Bucket::new(BucketName::Default, transport.clone()),
            lww: Bucket::new(BucketName::Lww, transport.clone()),
            cloud: Bucket::new(BucketName::Cloud, transport.clone()),
            local: Bucket::new(BucketName::Local, transport.clone()),
            history: History::new(transport.clone(), EVENTS_CATEGORY),
            alerts: AlertLog::new(transport.clone()),
            transport,
        })
    }

    /// creates a client for the node at `uri` with the default configuration
    pub fn connect(uri: &str) -> Result<Self> {
        Self::new(ClientConfig::new(uri)?)
    }

    /// the bucket called `name`
    pub fn bucket(&self, name: BucketName) -> &Bucket {
        match name {
            BucketName::Default => &self.default,
            BucketName::Lww => &self.lww,
            BucketName::Cloud => &self.cloud,
            BucketName::Local => &self.local,
        }
    }

    /// the `default` bucket
    pub fn default_bucket(&self) -> &Bucket {
        &self.default
    }

    /// the `default` bucket, under its other name
    pub fn shared(&self) -> &Bucket {
        &self.default
    }

    /// the last-writer-wins bucket
    pub fn lww(&self) -> &Bucket {
        &self.lww
    }

    /// the `cloud` bucket
    pub fn cloud(&self) -> &Bucket {
        &self.cloud
    }

    /// the node-local bucket
    pub fn local(&self) -> &Bucket {
        &self.local
    }

    /// the event log
    pub fn history(&self) -> &History {
        &self.history
    }

    /// the alert log
    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    /// DeviceDB nodes never ask this client for credentials
    pub fn requires_auth(&self) -> bool {
        false
    }

    /// adds the peer `peer_id` reachable at `peer_address`, e.g. `https://10.0.0.2:9090`.
    /// The port defaults to 443
    /// # Errors
    /// `DeviceDbError::Validation` if `peer_address` is not a URL with a host
    pub fn add_peer(&self, peer_id: &str, peer_address: &str) -> Result<()> {
        let address = Url::parse(peer_address).map_err(|e| {
            DeviceDbError::validation(format!("invalid peer address {}: {}", peer_address, e))
        })?;
        let host = address.host_str().ok_or_else(|| {
            DeviceDbError::validation(format!("peer address {} has no host", peer_address))
        })?;

        let peer = Peer {
            id: peer_id.to_string(),
            host: Some(host.to_string()),
            port: Some(address.port().unwrap_or(DEFAULT_PEER_PORT)),
        };
        let url = self.transport.endpoint(&["peers", peer_id])?;
        self.transport.call(self.transport.request(Method::PUT, url).json(&peer))
    }

    /// removes the peer `peer_id`
    pub fn remove_peer(&self, peer_id: &str) -> Result<()> {
        let url = self.transport.endpoint(&["peers", peer_id])?;
        self.transport.call(self.transport.request(Method::DELETE, url))
    }

    /// lists the peers of the node
    pub fn list_peers(&self) -> Result<Vec<Peer>> {
        let url = self.transport.endpoint(&["peers"])?;
        self.transport.call_json(self.transport.request(Method::GET, url))
    }

    /// gets the merkle root of the `default` bucket
    pub fn merkle_root(&self) -> Result<Value> {
        self.default.merkle_root()
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

    /// streams the keys of the `default` bucket starting with `prefix` to `next`
    pub fn get_matches<F>(&self, prefix: &str, mut next: F) -> Result<usize>
    where
        F: FnMut(Result<MatchRecord>),
    {
        self.default.get_matches(prefix, &mut next)
    }

    /// streams the keys of the `default` bucket starting with any of `prefixes` to `next`
    pub fn get_matches_many<F>(&self, prefixes: &[&str], mut next: F) -> Result<usize>
    where
        F: FnMut(Result<MatchRecord>),
    {
        self.default.get_matches_many(prefixes, &mut next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_client_takes_one_uri() {
        let config = ClientConfig::cluster(["http://a:1", "http://b:2"]).unwrap();
        assert!(matches!(DeviceDbClient::new(config), Err(DeviceDbError::InvalidUri(_))));
    }

    #[test]
    fn buckets_are_reachable_by_name() {
        let client = DeviceDbClient::connect("http://localhost:9090").unwrap();
        assert_eq!(client.bucket(BucketName::Lww).name(), BucketName::Lww);
        assert_eq!(client.shared().name(), BucketName::Default);
        assert_eq!(client.local().name(), BucketName::Local);
        assert_eq!(client.history().category(), "events");
        assert_eq!(client.alerts().history().category(), "alerts");
        assert!(!client.requires_auth());
    }

    #[test]
    fn bad_peer_address_is_rejected_before_sending() {
        let client = DeviceDbClient::connect("http://localhost:9090").unwrap();
        let err = client.add_peer("p1", "no address here").unwrap_err();
        assert!(matches!(err, DeviceDbError::Validation(_)));
    }
}
