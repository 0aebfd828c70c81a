//! Events extracted from blocks for the interpreter.

use silentbot_core::ContentRef;

/// A reply that names the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionEvent {
    /// Content the reply was made to; the subject of the command.
    pub target: ContentRef,
    /// The reply itself; its author is the caller.
    pub reply: ContentRef,
    pub body: String,
}

impl MentionEvent {
    pub fn caller(&self) -> &str {
        &self.reply.author
    }
}

/// A top-level post that may be worth a spare-capacity vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPost {
    pub target: ContentRef,
    pub app: String,
    pub tags: Vec<String>,
    /// Time of the block carrying the post.
    pub timestamp: i64,
}
