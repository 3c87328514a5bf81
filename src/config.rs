//! Client configuration.
//!
//! A [`ClientConfig`] is built once and turned into a single HTTP client that every bucket and
//! log of a DeviceDB client shares.
use std::fs;
use std::path::Path;

use reqwest::blocking::Client;
use reqwest::{Certificate, Url};
use tracing::warn;

use crate::error::{DeviceDbError, Result};

/// the maximum number of idle keep-alive connections kept per server
pub const MAX_IDLE_CONNECTIONS: usize = 4;

const PEM_CERT_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_CERT_END: &str = "-----END CERTIFICATE-----";

/// Connection settings for a [`DeviceDbClient`] or a [`ClusterClient`]
///
/// [`DeviceDbClient`]: ./struct.DeviceDbClient.html
/// [`ClusterClient`]: ./struct.ClusterClient.html
#[derive(Debug, Clone)]
pub struct ClientConfig {
    uris: Vec<Url>,
    root_certs: Vec<String>,
    accept_invalid_hostnames: bool,
    max_idle_connections: usize,
}

impl ClientConfig {
    /// configuration for a single server at `uri`
    /// # Errors
    /// `DeviceDbError::InvalidUri` if `uri` is not an absolute http(s) URL
    pub fn new(uri: &str) -> Result<Self> {
        Ok(ClientConfig {
            uris: vec![parse_uri(uri)?],
            root_certs: Vec::new(),
            accept_invalid_hostnames: false,
            max_idle_connections: MAX_IDLE_CONNECTIONS,
        })
    }

    /// configuration for a cluster. Every request goes to one of `uris`, picked at random
    /// # Errors
    /// `DeviceDbError::InvalidUri` if `uris` is empty or one of them is invalid
    pub fn cluster<I, S>(uris: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let uris = uris
            .into_iter()
            .map(|uri| parse_uri(uri.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        if uris.is_empty() {
            return Err(DeviceDbError::InvalidUri("no uri specified".to_string()));
        }

        Ok(ClientConfig {
            uris,
            root_certs: Vec::new(),
            accept_invalid_hostnames: false,
            max_idle_connections: MAX_IDLE_CONNECTIONS,
        })
    }

    /// trusts the certificates of the PEM bundle at `path` as additional roots
    pub fn with_root_ca_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let pem = fs::read_to_string(path)?;
        self.with_root_ca_pem(&pem)
    }

    /// trusts every certificate of the PEM bundle `pem` as an additional root
    /// # Errors
    /// `DeviceDbError::Validation` if the bundle holds no certificate or an invalid one
    pub fn with_root_ca_pem(mut self, pem: &str) -> Result<Self> {
        let certs = split_pem_bundle(pem);
        if certs.is_empty() {
            return Err(DeviceDbError::validation("no certificate found in root CA bundle"));
        }
        for cert in &certs {
            if !cert.contains(PEM_CERT_END) {
                return Err(DeviceDbError::validation("unterminated certificate in root CA bundle"));
            }
            Certificate::from_pem(cert.as_bytes()).map_err(|e| {
                DeviceDbError::validation(format!("invalid root certificate: {}", e))
            })?;
        }
        self.root_certs.extend(certs);
        Ok(self)
    }

    /// skips the check that a server certificate matches the server's host name.
    /// Certificates are still checked against the trusted roots. Off by default
    pub fn danger_accept_invalid_hostnames(mut self, accept: bool) -> Self {
        self.accept_invalid_hostnames = accept;
        self
    }

    /// sets the maximum number of idle connections kept per server
    pub fn max_idle_connections(mut self, max: usize) -> Self {
        self.max_idle_connections = max;
        self
    }

    /// the configured base URIs
    pub fn uris(&self) -> &[Url] {
        &self.uris
    }

    /// builds the HTTP client shared by every request made with this configuration
    pub(crate) fn build_http(&self) -> Result<Client> {
        let mut builder = Client::builder().pool_max_idle_per_host(self.max_idle_connections);

        for pem in &self.root_certs {
            builder = builder.add_root_certificate(Certificate::from_pem(pem.as_bytes())?);
        }
        if self.accept_invalid_hostnames {
            warn!("server certificate host names will not be verified");
            builder = builder.danger_accept_invalid_hostnames(true);
        }

        Ok(builder.build()?)
    }
}

/// parses `uri` and checks it can be used as a base for REST paths
fn parse_uri(uri: &str) -> Result<Url> {
    let url = Url::parse(uri).map_err(|e| DeviceDbError::InvalidUri(format!("{}: {}", uri, e)))?;

    match url.scheme() {
        "http" | "https" if !url.cannot_be_a_base() => Ok(url),
        _ => Err(DeviceDbError::InvalidUri(format!("{}: expected an http or https url", uri))),
    }
}

/// splits a PEM bundle into one PEM string per certificate.
/// Text outside the BEGIN/END markers (such as `# Issuer:` headers) is dropped
fn split_pem_bundle(pem: &str) -> Vec<String> {
    pem.split(PEM_CERT_BEGIN)
        .skip(1)
        .map(|chunk| match chunk.find(PEM_CERT_END) {
            Some(end) => &chunk[..end + PEM_CERT_END.len()],
            None => chunk,
        })
        .map(str::trim)
        .map(|chunk| format!("{}\n{}\n", PEM_CERT_BEGIN, chunk))
        .collect()
}
