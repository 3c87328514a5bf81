//! Line-delimited response streams.
//!
//! History queries and key matches are streamed back by the server one line at a time. Each
//! stream is consumed by a [`LineParser`], a small state machine fed once per line, and the
//! [`pump`] function drives a parser over a reader and hands every parsed item to a callback.
use std::io::BufRead;
use std::mem;

use serde_json::Value;
use tracing::warn;

use crate::error::{DeviceDbError, Result};
use crate::model::{Event, MatchRecord};
use crate::sibling::resolve_value;

/// A parser for one line-delimited stream
pub trait LineParser {
    /// the record produced by the stream
    type Item;

    /// consumes one line (without its line terminator).
    /// Returns `Ok(Some(item))` when the line completes a record
    fn feed(&mut self, line: &str) -> Result<Option<Self::Item>>;
}

/// Parses a history query stream: one JSON [`Event`] per line, blank lines skipped
#[derive(Debug, Default)]
pub struct HistoryParser;

impl LineParser for HistoryParser {
    type Item = Event;

    fn feed(&mut self, line: &str) -> Result<Option<Event>> {
        if line.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(line)?))
    }
}

/// Where the key match stream is within its three line cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MatchState {
    /// expecting the prefix line
    #[default]
    Prefix,
    /// expecting the key line
    Key {
        /// the prefix already read
        prefix: String,
    },
    /// expecting the siblings JSON line
    Siblings {
        /// the prefix already read
        prefix: String,
        /// the key already read
        key: String,
    },
}

/// advances the key match state machine by one line.
///
/// The cycle is `Prefix -> Key -> Siblings -> Prefix`; the record is emitted on the siblings line
pub fn transition(state: MatchState, line: &str) -> Result<(MatchState, Option<MatchRecord>)> {
    match state {
        MatchState::Prefix => Ok((MatchState::Key { prefix: line.to_string() }, None)),
        MatchState::Key { prefix } => {
            Ok((MatchState::Siblings { prefix, key: line.to_string() }, None))
        }
        MatchState::Siblings { prefix, key } => {
            let (siblings, context) = parse_siblings(line)?;
            let record = MatchRecord {
                prefix,
                key,
                value: resolve_value(&siblings),
                siblings,
                context,
            };
            Ok((MatchState::Prefix, Some(record)))
        }
    }
}

fn parse_siblings(line: &str) -> Result<(Vec<String>, String)> {
    let object: Value = serde_json::from_str(line)?;

    let siblings = match object.get("siblings") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| {
                    DeviceDbError::Stream(format!("sibling is not a string: {}", item))
                })
            })
            .collect::<Result<Vec<_>>>()?,
        _ => return Err(DeviceDbError::Stream("siblings is not an array".to_string())),
    };
    let context = object
        .get("context")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok((siblings, context))
}

/// Parses a key match stream, see [`transition`]
#[derive(Debug, Default)]
pub struct MatchParser {
    state: MatchState,
}

impl MatchParser {
    /// the current state of the parser
    pub fn state(&self) -> &MatchState {
        &self.state
    }
}

impl LineParser for MatchParser {
    type Item = MatchRecord;

    fn feed(&mut self, line: &str) -> Result<Option<MatchRecord>> {
        let state = mem::take(&mut self.state);
        let (state, record) = transition(state, line)?;
        self.state = state;
        Ok(record)
    }
}

/// feeds every line of `reader` to `parser`, passing each parsed item to `next`.
///
/// The first read or parse error is passed to `next` and ends the stream.
/// Returns the number of items delivered
pub fn pump<R, P, F>(reader: R, mut parser: P, mut next: F) -> usize
where
    R: BufRead,
    P: LineParser,
    F: FnMut(Result<P::Item>),
{
    let mut delivered = 0;
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("stream read failed after {} items: {}", delivered, e);
                next(Err(e.into()));
                return delivered;
            }
        };

        match parser.feed(&line) {
            Ok(Some(item)) => {
                delivered += 1;
                next(Ok(item));
            }
            Ok(None) => {}
            Err(e) => {
                warn!("stream parse failed after {} items: {}", delivered, e);
                next(Err(e));
                return delivered;
            }
        }
    }
    delivered
}
