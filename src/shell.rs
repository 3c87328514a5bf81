//! The interactive shell behind the `devicedb-shell` executable.
//!
//! Each input line is parsed into a [`Command`] and run against either a node client or a
//! cluster client. Results are printed as pretty JSON; errors are printed and the shell carries on.
use std::io::{BufRead, Write};

use serde::Serialize;
use serde_json::Value;

use crate::bucket::KvBucket;
use crate::client::DeviceDbClient;
use crate::cluster::ClusterClient;
use crate::error::{DeviceDbError, Result};
use crate::keys::{decode_key, encode_key};
use crate::model::{BucketName, Event, HistoryQuery, MatchRecord, PurgeQuery};

/// the shell prompt
pub const PROMPT: &str = "devicedb> ";

const HELP_TEXT: &str = r#"
Buckets (current bucket, default: default):
  use <bucket>                    switch to default|shared|lww|cloud|local
  put <key> <value> [context]     write a value
  delete <key> [context]          delete a key
  get <key>...                    read keys
  matches <prefix>...             read every key starting with a prefix

Node only:
  merkle                          merkle root of the current bucket
  peers                           list peers
  addPeer <id> <address>          add a peer, e.g. addPeer p1 https://10.0.0.2:9090
  removePeer <id>                 remove a peer
  log <source> <type> [json]      log an event
  query [json]                    query events, e.g. query {"sources":["s"],"limit":5}
  purge [json]                    purge events, e.g. purge {"maxAge":60000}
  raise <name> <level> [json]     raise an alert
  lower <name> <level> [json]     lower an alert
  auth                            whether the node requires authentication

Cluster only:
  site <id>                       select the site the bucket commands apply to
  addSite <id> | removeSite <id>
  addRelay <id> | removeRelay <id>
  moveRelay <relay> <site>

Other:
  encode <text>                   base64 encode a key
  decode <base64>                 decode a key
  help                            this message
  exit | quit                     leave the shell
"#;

/// What the shell talks to
#[derive(Debug, Clone)]
pub enum Target {
    /// a single DeviceDB node
    Node(DeviceDbClient),
    /// a DeviceDB cluster
    Cluster(ClusterClient),
}

/// A parsed shell command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// print the help text
    Help,
    /// leave the shell
    Exit,
    /// switch the current bucket
    Use(BucketName),
    /// select the current cluster site
    Site(String),
    /// write a value
    Put {
        /// the key
        key: String,
        /// the value
        value: String,
        /// context from a previous read
        context: Option<String>,
    },
    /// delete a key
    Delete {
        /// the key
        key: String,
        /// context from a previous read
        context: Option<String>,
    },
    /// read keys
    Get(Vec<String>),
    /// read keys by prefix
    Matches(Vec<String>),
    /// merkle root of the current bucket
    Merkle,
    /// list peers
    Peers,
    /// add a peer
    AddPeer {
        /// peer id
        id: String,
        /// peer URL
        address: String,
    },
    /// remove a peer
    RemovePeer(String),
    /// log an event
    Log(Event),
    /// query events
    Query(HistoryQuery),
    /// purge events
    Purge(PurgeQuery),
    /// raise (`raise == true`) or lower an alert
    Alert {
        /// raise or lower
        raise: bool,
        /// alert name
        name: String,
        /// alert level
        level: String,
        /// extra data attached to the alert
        metadata: Value,
    },
    /// add a relay to the cluster
    AddRelay(String),
    /// remove a relay from the cluster
    RemoveRelay(String),
    /// move a relay to a site
    MoveRelay {
        /// relay id
        relay: String,
        /// site id
        site: String,
    },
    /// add a site to the cluster
    AddSite(String),
    /// remove a site from the cluster
    RemoveSite(String),
    /// base64 encode a key
    Encode(String),
    /// decode a base64 key
    Decode(String),
    /// whether the node requires authentication
    Auth,
}

/// splits up to `n` whitespace separated words off `input`, returning them and the trimmed rest
fn take_words(input: &str, n: usize) -> (Vec<&str>, &str) {
    let mut rest = input;
    let mut words = Vec::with_capacity(n);
    for _ in 0..n {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        words.push(&rest[..end]);
        rest = &rest[end..];
    }
    (words, rest.trim())
}

fn usage(text: &str) -> DeviceDbError {
    DeviceDbError::validation(format!("usage: {}", text))
}

/// exactly `n` words and nothing after them
fn exact<'a>(args: &'a str, n: usize, text: &str) -> Result<Vec<&'a str>> {
    match take_words(args, n) {
        (words, "") if words.len() == n => Ok(words),
        _ => Err(usage(text)),
    }
}

/// `n` words and an optional single word after them
fn with_optional<'a>(
    args: &'a str,
    n: usize,
    text: &str,
) -> Result<(Vec<&'a str>, Option<String>)> {
    let (words, rest) = take_words(args, n);
    if words.len() != n || rest.split_whitespace().count() > 1 {
        return Err(usage(text));
    }
    Ok((words, Some(rest).filter(|r| !r.is_empty()).map(String::from)))
}

/// parses optional trailing JSON, `default` when absent
fn json_or<T: serde::de::DeserializeOwned>(rest: &str, default: T) -> Result<T> {
    if rest.is_empty() {
        Ok(default)
    } else {
        Ok(serde_json::from_str(rest)?)
    }
}

/// at least one word
fn one_or_more(args: &str, text: &str) -> Result<Vec<String>> {
    let words: Vec<String> = args.split_whitespace().map(String::from).collect();
    if words.is_empty() {
        return Err(usage(text));
    }
    Ok(words)
}

/// parses one line of shell input. Returns `Ok(None)` for a blank line
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let (name, args) = take_words(line, 1);
    let name = match name.first() {
        Some(name) => *name,
        None => return Ok(None),
    };

    let command = match name {
        "help" => Command::Help,
        "exit" | "quit" => Command::Exit,
        "use" => Command::Use(exact(args, 1, "use <bucket>")?[0].parse()?),
        "site" => Command::Site(exact(args, 1, "site <id>")?[0].to_string()),
        "put" => {
            let (words, context) = with_optional(args, 2, "put <key> <value> [context]")?;
            Command::Put { key: words[0].to_string(), value: words[1].to_string(), context }
        }
        "delete" => {
            let (words, context) = with_optional(args, 1, "delete <key> [context]")?;
            Command::Delete { key: words[0].to_string(), context }
        }
        "get" => Command::Get(one_or_more(args, "get <key>...")?),
        "matches" => Command::Matches(one_or_more(args, "matches <prefix>...")?),
        "merkle" => {
            exact(args, 0, "merkle")?;
            Command::Merkle
        }
        "peers" => {
            exact(args, 0, "peers")?;
            Command::Peers
        }
        "addPeer" => {
            let words = exact(args, 2, "addPeer <id> <address>")?;
            Command::AddPeer { id: words[0].to_string(), address: words[1].to_string() }
        }
        "removePeer" => Command::RemovePeer(exact(args, 1, "removePeer <id>")?[0].to_string()),
        "log" => {
            let (words, rest) = take_words(args, 2);
            if words.len() != 2 {
                return Err(usage("log <source> <type> [json]"));
            }
            Command::Log(Event::new(words[0], words[1], json_or(rest, Value::Null)?))
        }
        "query" => Command::Query(json_or(args, HistoryQuery::default())?),
        "purge" => Command::Purge(json_or(args, PurgeQuery::default())?),
        "raise" | "lower" => {
            let (words, rest) = take_words(args, 2);
            if words.len() != 2 {
                return Err(usage("raise|lower <name> <level> [json]"));
            }
            Command::Alert {
                raise: name == "raise",
                name: words[0].to_string(),
                level: words[1].to_string(),
                metadata: json_or(rest, Value::Null)?,
            }
        }
        "addRelay" => Command::AddRelay(exact(args, 1, "addRelay <id>")?[0].to_string()),
        "removeRelay" => Command::RemoveRelay(exact(args, 1, "removeRelay <id>")?[0].to_string()),
        "moveRelay" => {
            let words = exact(args, 2, "moveRelay <relay> <site>")?;
            Command::MoveRelay { relay: words[0].to_string(), site: words[1].to_string() }
        }
        "addSite" => Command::AddSite(exact(args, 1, "addSite <id>")?[0].to_string()),
        "removeSite" => Command::RemoveSite(exact(args, 1, "removeSite <id>")?[0].to_string()),
        "encode" => Command::Encode(args.to_string()),
        "decode" => Command::Decode(exact(args, 1, "decode <base64>")?[0].to_string()),
        "auth" => Command::Auth,
        other => {
            return Err(DeviceDbError::validation(format!(
                "unknown command: {} (type help for a list of commands)",
                other
            )))
        }
    };
    Ok(Some(command))
}

/// whether the shell keeps reading input after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// read the next command
    Continue,
    /// leave the shell
    Exit,
}

/// The shell state: what it talks to, the current bucket and site, and where output goes
pub struct Shell<W: Write> {
    target: Target,
    bucket: BucketName,
    site: Option<String>,
    out: W,
}

impl<W: Write> Shell<W> {
    /// creates a shell on `target` writing to `out`. The current bucket starts as `default`
    pub fn new(target: Target, out: W) -> Self {
        Shell { target, bucket: BucketName::Default, site: None, out }
    }

    /// reads and runs commands from `input` until `exit` or end of input
    pub fn run<R: BufRead>(&mut self, mut input: R) -> Result<()> {
        loop {
            write!(self.out, "{}", PROMPT)?;
            self.out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(self.out)?;
                return Ok(());
            }

            let outcome = parse_command(&line).and_then(|command| match command {
                Some(command) => self.execute(command),
                None => Ok(Flow::Continue),
            });
            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => return Ok(()),
                Err(e) => writeln!(self.out, "error: {}", e)?,
            }
        }
    }

    /// runs a single command
    pub fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Help => writeln!(self.out, "{}", HELP_TEXT)?,
            Command::Exit => return Ok(Flow::Exit),
            Command::Use(bucket) => self.bucket = bucket,
            Command::Site(site) => {
                self.cluster()?;
                self.site = Some(site);
            }
            Command::Put { key, value, context } => {
                self.current_bucket()?.put(&key, &value, context.as_deref())?
            }
            Command::Delete { key, context } => {
                self.current_bucket()?.delete(&key, context.as_deref())?
            }
            Command::Get(keys) => {
                let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
                let objects = self.current_bucket()?.get_many(&keys)?;
                self.print(&objects)?;
            }
            Command::Matches(prefixes) => {
                let prefixes: Vec<&str> = prefixes.iter().map(String::as_str).collect();
                let mut results: Vec<Result<MatchRecord>> = Vec::new();
                self.current_bucket()?.get_matches_many(&prefixes, &mut |r| results.push(r))?;
                for result in results {
                    match result {
                        Ok(record) => self.print(&record)?,
                        Err(e) => writeln!(self.out, "error: {}", e)?,
                    }
                }
            }
            Command::Merkle => {
                let root = self.node()?.bucket(self.bucket).merkle_root()?;
                self.print(&root)?;
            }
            Command::Peers => {
                let peers = self.node()?.list_peers()?;
                self.print(&peers)?;
            }
            Command::AddPeer { id, address } => self.node()?.add_peer(&id, &address)?,
            Command::RemovePeer(id) => self.node()?.remove_peer(&id)?,
            Command::Log(event) => self.node()?.history().log(&event)?,
            Command::Query(query) => {
                let mut results: Vec<Result<Event>> = Vec::new();
                self.node()?.history().query(&query, |r| results.push(r))?;
                for result in results {
                    match result {
                        Ok(event) => self.print(&event)?,
                        Err(e) => writeln!(self.out, "error: {}", e)?,
                    }
                }
            }
            Command::Purge(query) => self.node()?.history().purge(&query)?,
            Command::Alert { raise: true, name, level, metadata } => {
                self.node()?.alerts().raise_alert(&name, &level, metadata)?
            }
            Command::Alert { raise: false, name, level, metadata } => {
                self.node()?.alerts().lower_alert(&name, &level, metadata)?
            }
            Command::AddRelay(id) => self.cluster()?.add_relay(&id)?,
            Command::RemoveRelay(id) => self.cluster()?.remove_relay(&id)?,
            Command::MoveRelay { relay, site } => self.cluster()?.move_relay(&relay, &site)?,
            Command::AddSite(id) => self.cluster()?.add_site(&id)?,
            Command::RemoveSite(id) => self.cluster()?.remove_site(&id)?,
            Command::Encode(text) => writeln!(self.out, "{}", encode_key(text))?,
            Command::Decode(encoded) => {
                let key = decode_key(&encoded)?;
                writeln!(self.out, "{}", String::from_utf8_lossy(&key))?;
            }
            Command::Auth => {
                let required = self.node()?.requires_auth();
                self.print(&required)?;
            }
        }
        Ok(Flow::Continue)
    }

    fn print<T: Serialize>(&mut self, value: &T) -> Result<()> {
        writeln!(self.out, "{}", serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    fn node(&self) -> Result<&DeviceDbClient> {
        match &self.target {
            Target::Node(client) => Ok(client),
            Target::Cluster(_) => {
                Err(DeviceDbError::validation("this command needs a node, not a cluster"))
            }
        }
    }

    fn cluster(&self) -> Result<&ClusterClient> {
        match &self.target {
            Target::Cluster(cluster) => Ok(cluster),
            Target::Node(_) => Err(DeviceDbError::validation("this command needs --cluster")),
        }
    }

    /// the bucket the key/value commands apply to
    fn current_bucket(&self) -> Result<Box<dyn KvBucket>> {
        match &self.target {
            Target::Node(client) => Ok(Box::new(client.bucket(self.bucket).clone())),
            Target::Cluster(cluster) => {
                let site = self
                    .site
                    .as_deref()
                    .ok_or_else(|| DeviceDbError::validation("no site selected, use: site <id>"))?;
                Ok(Box::new(cluster.site(site).bucket(self.bucket).clone()))
            }
        }
    }
}
