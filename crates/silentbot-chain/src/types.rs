//! Wire types for blocks, operations and posts.
//!
//! Node payloads are loosely typed JSON. They are narrowed here, at the
//! boundary, into a closed set of operation variants: comment operations are
//! kept, everything else collapses into `Operation::Other`.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use silentbot_core::{ContentRef, Error, Result};

const CHAIN_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse a node timestamp (`2024-05-01T12:00:00`, UTC) into unix seconds.
pub fn parse_chain_time(raw: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(raw.trim_end_matches('Z'), CHAIN_TIME_FORMAT)
        .ok()
        .map(|t| t.and_utc().timestamp())
}

/// Format unix seconds the way nodes expect them in transactions.
pub fn format_chain_time(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .format(CHAIN_TIME_FORMAT)
        .to_string()
}

/// Decode a `json_metadata` string. Anything but a JSON object yields `None`.
pub fn parse_metadata(raw: &str) -> Option<Map<String, Value>> {
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// String entries of a metadata list field; non-strings are skipped.
pub fn string_list(metadata: &Map<String, Value>, field: &str) -> Option<Vec<String>> {
    metadata.get(field)?.as_array().map(|items| {
        items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub timestamp: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// A block holding `operations` in a single transaction.
    pub fn new(time: i64, operations: Vec<Operation>) -> Self {
        Self {
            timestamp: format_chain_time(time),
            transactions: vec![Transaction { operations }],
        }
    }

    /// Block time in unix seconds, 0 if the node sent garbage.
    pub fn time(&self) -> i64 {
        parse_chain_time(&self.timestamp).unwrap_or(0)
    }

    /// All operations in canonical order: transaction, then operation index.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.transactions.iter().flat_map(|t| t.operations.iter())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawOperation {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawOperation")]
pub enum Operation {
    Comment(CommentOperation),
    /// Any other operation type, or a comment whose body did not decode.
    Other(String),
}

impl From<RawOperation> for Operation {
    fn from(raw: RawOperation) -> Self {
        if raw.kind == "comment_operation" {
            if let Ok(comment) = serde_json::from_value(raw.value) {
                return Operation::Comment(comment);
            }
        }
        Operation::Other(raw.kind)
    }
}

/// Post or reply, as found in blocks and as broadcast by the bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentOperation {
    pub parent_author: String,
    pub parent_permlink: String,
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub json_metadata: String,
}

impl CommentOperation {
    /// Replies have a parent author; root posts only a parent permlink (category).
    pub fn is_reply(&self) -> bool {
        !self.parent_author.is_empty()
    }

    pub fn content(&self) -> ContentRef {
        ContentRef::new(&self.author, &self.permlink)
    }

    pub fn parent(&self) -> ContentRef {
        ContentRef::new(&self.parent_author, &self.parent_permlink)
    }

    pub fn metadata(&self) -> Option<Map<String, Value>> {
        parse_metadata(&self.json_metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteOperation {
    pub voter: String,
    pub author: String,
    pub permlink: String,
    /// Signed weight in hundredths of a percent, -10000..=10000.
    pub weight: i16,
}

/// Something the bot asks the ledger to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Vote(VoteOperation),
    Comment(CommentOperation),
}

impl Action {
    /// Account whose key must sign the action.
    pub fn signer(&self) -> &str {
        match self {
            Action::Vote(v) => &v.voter,
            Action::Comment(c) => &c.author,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Vote(_) => "vote",
            Action::Comment(_) => "comment",
        }
    }
}

/// Outcome of a broadcast that the node did not refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Accepted,
    /// The requested state already exists on chain ("identical" vote).
    Duplicate,
}

/// The parts of a post the interpreter cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct PostInfo {
    pub target: ContentRef,
    /// Creation time in unix seconds.
    pub created: i64,
    pub tags: Vec<String>,
    pub percent_hbd: Option<u32>,
}

impl PostInfo {
    /// Decode a `bridge.get_post` result.
    pub fn from_bridge(value: &Value) -> Result<Self> {
        let author = value["author"]
            .as_str()
            .ok_or_else(|| Error::Malformed("post without author".into()))?;
        let permlink = value["permlink"]
            .as_str()
            .ok_or_else(|| Error::Malformed("post without permlink".into()))?;

        let metadata = match &value["json_metadata"] {
            Value::Object(map) => Some(map.clone()),
            Value::String(raw) => parse_metadata(raw),
            _ => None,
        };
        let tags = metadata
            .as_ref()
            .and_then(|m| string_list(m, "tags"))
            .unwrap_or_default();

        Ok(Self {
            target: ContentRef::new(author, permlink),
            created: value["created"]
                .as_str()
                .and_then(parse_chain_time)
                .unwrap_or(0),
            tags,
            percent_hbd: value["percent_hbd"].as_u64().map(|p| p as u32),
        })
    }

    /// Author chose to receive the full payout as stake.
    pub fn power_up(&self) -> bool {
        self.percent_hbd == Some(0)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
