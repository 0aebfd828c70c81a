//! Block cursor and comment classification.

use serde::{Deserialize, Serialize};

use silentbot_chain::types::string_list;
use silentbot_chain::CommentOperation;
use silentbot_curation::{MentionEvent, RootPost};

/// How far behind the head a fresh start begins.
pub const COLD_START_DEPTH: u64 = 100;

/// Height of the next block to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockCursor(u64);

impl BlockCursor {
    pub fn new(next: u64) -> Self {
        Self(next)
    }

    /// Start a little behind the head so recent commands are not missed.
    pub fn cold_start(head: u64) -> Self {
        Self(head.saturating_sub(COLD_START_DEPTH).max(1))
    }

    pub fn next(&self) -> u64 {
        self.0
    }

    pub fn advance(&mut self) {
        self.0 += 1;
    }

    /// Blocks between the cursor and `head`, inclusive.
    pub fn backlog(&self, head: u64) -> u64 {
        (head + 1).saturating_sub(self.0)
    }
}

/// What a comment operation means to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Mention(MentionEvent),
    RootPost(RootPost),
}

/// Classify one comment operation seen in a block at `block_time`.
///
/// Replies naming the bot (in metadata `users`, or as the first word of the
/// body) are mentions. Root posts with an `app` and a `tags` list are
/// candidates for spare-capacity votes. Everything else is `None`.
pub fn classify(op: &CommentOperation, bot: &str, block_time: i64) -> Option<Classified> {
    let metadata = op.metadata();

    if op.is_reply() {
        let listed = metadata
            .as_ref()
            .and_then(|m| string_list(m, "users"))
            .is_some_and(|users| users.iter().any(|u| u == bot));
        if listed || addressed_to(&op.body, bot) {
            return Some(Classified::Mention(MentionEvent {
                target: op.parent(),
                reply: op.content(),
                body: op.body.clone(),
            }));
        }
        return None;
    }

    let metadata = metadata?;
    let app = metadata.get("app")?.as_str()?;
    let tags = string_list(&metadata, "tags")?;
    Some(Classified::RootPost(RootPost {
        target: op.content(),
        app: app.to_string(),
        tags,
        timestamp: block_time,
    }))
}

/// Body starts with `@bot` followed by whitespace or nothing.
fn addressed_to(body: &str, bot: &str) -> bool {
    body.strip_prefix('@')
        .and_then(|rest| rest.strip_prefix(bot))
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}
