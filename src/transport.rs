use std::sync::Arc;

use rand::Rng;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{DeviceDbError, Result};

/// `Transport` sends requests to a DeviceDB server (or to a random member of a cluster) and
/// turns every non-200 answer into a [`DeviceDbError::Protocol`].
///
/// Cloning a transport is cheap: clones share the HTTP client and its connection pool.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http: Client,
    bases: Arc<[Url]>,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Transport {
            http: config.build_http()?,
            bases: config.uris().to_vec().into(),
        })
    }

    /// picks the base URI for the next request
    fn base(&self) -> &Url {
        let index = if self.bases.len() > 1 {
            rand::thread_rng().gen_range(0..self.bases.len())
        } else {
            0
        };
        &self.bases[index]
    }

    /// builds the URL of `segments` against a base URI. Segments are percent-encoded and replace
    /// any path the base URI had
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base().clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| DeviceDbError::InvalidUri("base uri cannot hold a path".to_string()))?
            .clear()
            .extend(segments);
        Ok(url)
    }

    /// like [`Transport::endpoint`] with a query string. No pairs means no query string at all
    pub fn endpoint_with_query<K, V>(&self, segments: &[&str], pairs: &[(K, V)]) -> Result<Url>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = self.endpoint(segments)?;
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs.iter().map(|(k, v)| (k.as_ref(), v.as_ref())));
        }
        Ok(url)
    }

    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url)
    }

    /// sends `request` and checks its status
    /// # Errors
    /// `DeviceDbError::Transport` if no response arrived,
    /// `DeviceDbError::Protocol` if the status is not `200 OK`
    pub fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let request = request.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!("Sending {} {}", method, url);

        let response = self.http.execute(request)?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().unwrap_or_else(|e| {
                warn!("Could not read the body of {} {}: {}", method, url, e);
                format!("<unreadable response body: {}>", e)
            });
            warn!("{} {} failed with status {}: {}", method, url, status, body);
            return Err(DeviceDbError::Protocol { status: status.as_u16(), body });
        }

        debug!("Response from {} {}: {}", method, url, status);
        Ok(response)
    }

    /// sends `request`, discarding the response body
    pub fn call(&self, request: RequestBuilder) -> Result<()> {
        self.execute(request)?;
        Ok(())
    }

    /// sends `request` and decodes the JSON response body
    pub fn call_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.execute(request)?.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(uri: &str) -> Transport {
        Transport::new(&ClientConfig::new(uri).unwrap()).unwrap()
    }

    #[test]
    fn endpoint_replaces_the_base_path() {
        let t = transport("http://localhost:9090/some/path?x=1");
        let url = t.endpoint(&["default", "batch"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9090/default/batch");
    }

    #[test]
    fn endpoint_encodes_segments() {
        let t = transport("http://localhost:9090");
        let url = t.endpoint(&["peers", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9090/peers/a%20b%2Fc");
    }

    #[test]
    fn empty_query_is_left_out() {
        let t = transport("http://localhost:9090");
        let none: [(&str, &str); 0] = [];
        let url = t.endpoint_with_query(&["events"], &none).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9090/events");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn cluster_picks_one_of_its_bases() {
        let config = ClientConfig::cluster(["http://a:1", "http://b:2"]).unwrap();
        let t = Transport::new(&config).unwrap();
        for _ in 0..20 {
            let host = t.endpoint(&["sites"]).unwrap().host_str().unwrap().to_string();
            assert!(host == "a" || host == "b");
        }
    }
}
