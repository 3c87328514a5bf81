//! Sibling resolution.
//!
//! DeviceDB keeps every concurrent write to a key as a "sibling". The client only resolves the
//! trivial case: a single sibling is the value. Anything else is left to the application.
use serde::Deserialize;

use crate::model::{DbObject, MatchRecord};

/// returns the value of `siblings` if there is exactly one, else `None`
pub fn resolve_value(siblings: &[String]) -> Option<String> {
    match siblings {
        [only] => Some(only.clone()),
        _ => None,
    }
}

/// An object as the server sends it, before resolution.
/// `siblings` may be missing or `null` for keys that were never written
#[derive(Debug, Deserialize)]
pub(crate) struct RawDbObject {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub siblings: Option<Vec<String>>,
    #[serde(default)]
    pub context: String,
}

impl RawDbObject {
    /// resolves the object. Returns `None` if the server sent no sibling array
    pub fn into_db_object(self) -> Option<DbObject> {
        let siblings = self.siblings?;
        Some(DbObject {
            value: resolve_value(&siblings),
            siblings,
            context: self.context,
        })
    }

    /// resolves the object into a match record. A missing sibling array becomes an empty one
    pub fn into_match_record(self) -> MatchRecord {
        let siblings = self.siblings.unwrap_or_default();
        MatchRecord {
            prefix: self.prefix.unwrap_or_default(),
            key: self.key.unwrap_or_default(),
            value: resolve_value(&siblings),
            siblings,
            context: self.context,
        }
    }
}
