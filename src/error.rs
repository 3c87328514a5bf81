use thiserror::Error;

/// type alias for all operations on a DeviceDB client that could fail with a [`DeviceDbError`]
pub type Result<T> = std::result::Result<T, DeviceDbError>;

/// The Error variants returned by the DeviceDB clients.
/// It wraps the lower level errors from the HTTP, JSON and base64 crates
#[derive(Error, Debug)]
pub enum DeviceDbError {
    /// the request never produced a response (connect failure, broken socket, TLS failure...)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// the server answered with something other than `200 OK`.
    /// `body` holds the raw response body
    #[error("request failed with status {status}: {body}")]
    Protocol {
        /// the HTTP status code of the response
        status: u16,
        /// the response body, as text
        body: String,
    },

    /// caller input was rejected before any request was sent
    #[error("{0}")]
    Validation(String),

    /// a response or stream line was not valid JSON
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// a stream record was valid JSON but had the wrong shape
    #[error("stream error: {0}")]
    Stream(String),

    /// a base URI or peer address could not be used
    #[error("invalid uri: {0}")]
    InvalidUri(String),

    /// variant for errors caused by file or stream IO
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// a key was not valid base64
    #[error("invalid key encoding: {0}")]
    Key(#[from] base64::DecodeError),
}

impl DeviceDbError {
    /// parses the body of a [`DeviceDbError::Protocol`] error as JSON.
    /// Returns `None` for every other variant or if the body is not JSON
    pub fn body_json(&self) -> Option<serde_json::Value> {
        match self {
            DeviceDbError::Protocol { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }

    /// returns the HTTP status code of a [`DeviceDbError::Protocol`] error
    pub fn status(&self) -> Option<u16> {
        match self {
            DeviceDbError::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        DeviceDbError::Validation(msg.into())
    }
}
