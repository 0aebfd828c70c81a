//! Shared domain types.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A piece of on-chain content, addressed by author and permlink.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentRef {
    pub author: String,
    pub permlink: String,
}

impl ContentRef {
    pub fn new(author: impl Into<String>, permlink: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            permlink: permlink.into(),
        }
    }

    /// Permlink of the bot's answer to this content.
    ///
    /// Deterministic, so a replayed command finds its earlier answer.
    pub fn response_permlink(&self, bot: &str) -> String {
        format!("{}-{}-{}", self.author.replace('.', "-"), self.permlink, bot)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}/{}", self.author, self.permlink)
    }
}

/// Social graph of one voting account, fetched once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountInterests {
    /// Authors this account follows.
    pub following: HashSet<String>,
    /// Communities this account is subscribed to.
    pub subscriptions: HashSet<String>,
    /// Authors this account has blacklisted.
    pub blacklist: HashSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_permlink_replaces_dots() {
        let target = ContentRef::new("foo.bar", "my-post");
        assert_eq!(target.response_permlink("silentbot"), "foo-bar-my-post-silentbot");
    }

    #[test]
    fn test_display() {
        let target = ContentRef::new("alice", "hello");
        assert_eq!(target.to_string(), "@alice/hello");
    }
}
