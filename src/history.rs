//! The event log and the alert log built on top of it.
use std::io::BufReader;

use reqwest::{Method, Url};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{DeviceDbError, Result};
use crate::model::{Event, HistoryQuery, PurgeQuery};
use crate::stream::{pump, HistoryParser};
use crate::transport::Transport;

/// category of ordinary events
pub const EVENTS_CATEGORY: &str = "events";
/// category of alert events
pub const ALERTS_CATEGORY: &str = "alerts";

/// `History` writes, queries and purges the event log of a node.
/// Every event it logs is filed under its category
#[derive(Debug, Clone)]
pub struct History {
    transport: Transport,
    category: &'static str,
}

impl History {
    pub(crate) fn new(transport: Transport, category: &'static str) -> Self {
        History { transport, category }
    }

    /// the category events are logged under
    pub fn category(&self) -> &str {
        self.category
    }

    /// appends `event` to the log
    /// # Errors
    /// `DeviceDbError::Validation` if the source or type of the event is empty; nothing is sent
    pub fn log(&self, event: &Event) -> Result<()> {
        if event.source.is_empty() {
            return Err(DeviceDbError::validation("event.source is empty"));
        }
        if event.event_type.is_empty() {
            return Err(DeviceDbError::validation("event.type is empty"));
        }

        let url = self.log_url(event)?;
        self.transport.call(self.transport.request(Method::PUT, url).json(&event.data))
    }

    /// streams every event matching `query` to `next`, one call per event.
    ///
    /// Returns the number of events delivered. A malformed event is passed to `next` as an error
    /// and ends the stream
    pub fn query<F>(&self, query: &HistoryQuery, mut next: F) -> Result<usize>
    where
        F: FnMut(Result<Event>),
    {
        let url = self.query_url(query)?;
        let response = self.transport.execute(self.transport.request(Method::GET, url))?;

        let delivered = pump(BufReader::new(response), HistoryParser, &mut next);
        debug!("history query delivered {} events", delivered);
        Ok(delivered)
    }

    /// deletes the events selected by `query`
    pub fn purge(&self, query: &PurgeQuery) -> Result<()> {
        let url = self.transport.endpoint_with_query(&["events"], &query.query_pairs())?;
        self.transport.call(self.transport.request(Method::DELETE, url))
    }

    fn log_url(&self, event: &Event) -> Result<Url> {
        let mut pairs: Vec<(&str, &str)> = vec![("category", self.category)];
        pairs.extend(event.groups.iter().map(|group| ("group", group.as_str())));

        self.transport.endpoint_with_query(
            &["events", event.source.as_str(), event.event_type.as_str()],
            &pairs,
        )
    }

    fn query_url(&self, query: &HistoryQuery) -> Result<Url> {
        self.transport.endpoint_with_query(&["events"], &query.query_pairs())
    }
}

/// `AlertLog` raises and lowers named alerts. An alert is an event in the `alerts` category whose
/// source is the alert name, whose type is the alert level and whose data records the status
#[derive(Debug, Clone)]
pub struct AlertLog {
    history: History,
}

impl AlertLog {
    pub(crate) fn new(transport: Transport) -> Self {
        AlertLog { history: History::new(transport, ALERTS_CATEGORY) }
    }

    /// the underlying alert history
    pub fn history(&self) -> &History {
        &self.history
    }

    /// raises the alert `name`
    /// # Errors
    /// `DeviceDbError::Validation` if `name` is blank; nothing is sent
    pub fn raise_alert(&self, name: &str, level: &str, metadata: Value) -> Result<()> {
        self.set_alert(name, level, metadata, true)
    }

    /// lowers the alert `name`
    /// # Errors
    /// `DeviceDbError::Validation` if `name` is blank; nothing is sent
    pub fn lower_alert(&self, name: &str, level: &str, metadata: Value) -> Result<()> {
        self.set_alert(name, level, metadata, false)
    }

    fn set_alert(&self, name: &str, level: &str, metadata: Value, status: bool) -> Result<()> {
        if name.trim().is_empty() {
            return Err(DeviceDbError::validation("Invalid alert name (argument 1) specified"));
        }

        let data = json!({ "status": status, "metadata": metadata });
        self.history.log(&Event::new(name, level, data))
    }
}
