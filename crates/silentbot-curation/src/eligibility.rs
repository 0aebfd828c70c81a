//! Who may command the bot, what may be rated, and what abuse costs.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use silentbot_core::{AccountInterests, BotConfig};

/// Penalty for the first spam report against an author.
pub const SPAM_FIRST_PENALTY: i32 = -5_000;
/// Penalty for every later spam report against the same author.
pub const SPAM_REPEAT_PENALTY: i32 = -10_000;

/// Penalty for the `incident`-th (1-based) tag-abuse report against an author.
pub fn tag_abuse_penalty(incident: u32) -> i32 {
    match incident {
        0 | 1 => -100,
        2..=5 => -1_000,
        _ => -2_500,
    }
}

/// Durable denylist and incident counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityState {
    /// Union of every voting account's personal blacklist.
    #[serde(default)]
    pub blacklist: BTreeSet<String>,
    /// Authors already reported for spam at least once.
    #[serde(default)]
    pub spammers: BTreeSet<String>,
    /// Tag-abuse incidents per author. Never reset.
    #[serde(default)]
    pub tag_abuse: BTreeMap<String, u32>,
    /// Non-curators who were already told they cannot command the bot.
    #[serde(default)]
    pub notified_non_curators: BTreeSet<String>,
}

impl EligibilityState {
    pub fn is_blacklisted(&self, author: &str) -> bool {
        self.blacklist.contains(author)
    }

    /// Add freshly fetched blacklist entries; existing ones are kept.
    pub fn extend_blacklist<I>(&mut self, authors: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.blacklist.extend(authors);
    }

    pub fn spam_penalty(&self, author: &str) -> i32 {
        if self.spammers.contains(author) {
            SPAM_REPEAT_PENALTY
        } else {
            SPAM_FIRST_PENALTY
        }
    }

    pub fn record_spam(&mut self, author: &str) {
        self.spammers.insert(author.to_string());
    }

    /// Number the next tag-abuse report against `author` would get.
    pub fn next_tag_incident(&self, author: &str) -> u32 {
        self.tag_abuse.get(author).copied().unwrap_or(0) + 1
    }

    pub fn record_tag_abuse(&mut self, author: &str, incident: u32) {
        let count = self.tag_abuse.entry(author.to_string()).or_insert(0);
        *count = (*count).max(incident);
    }

    /// Mark `caller` as notified. True the first time only.
    pub fn notify_non_curator(&mut self, caller: &str) -> bool {
        self.notified_non_curators.insert(caller.to_string())
    }
}

/// Why a star rating was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StarRejection {
    Blacklisted(String),
    NotTribe,
    NoTag,
}

/// Static eligibility rules plus the per-account social graph.
#[derive(Debug, Clone)]
pub struct EligibilityGate {
    curators: HashSet<String>,
    tribe: String,
    tags: Vec<String>,
    excluded_apps: Vec<String>,
    interests: BTreeMap<String, AccountInterests>,
}

impl EligibilityGate {
    pub fn new(config: &BotConfig, interests: BTreeMap<String, AccountInterests>) -> Self {
        Self {
            curators: config.curators.iter().cloned().collect(),
            tribe: config.tribe.clone(),
            tags: config.tags.clone(),
            excluded_apps: config.excluded_apps.clone(),
            interests,
        }
    }

    pub fn is_curator(&self, account: &str) -> bool {
        self.curators.contains(account)
    }

    /// Union of every account's blacklist.
    pub fn aggregated_blacklist(&self) -> BTreeSet<String> {
        self.interests
            .values()
            .flat_map(|i| i.blacklist.iter().cloned())
            .collect()
    }

    /// Tribe and curation-tag requirements for a star rating.
    pub fn check_tags(&self, tags: &[String]) -> Result<(), StarRejection> {
        if !tags.iter().any(|t| *t == self.tribe) {
            return Err(StarRejection::NotTribe);
        }
        if !tags.iter().any(|t| self.tags.contains(t)) {
            return Err(StarRejection::NoTag);
        }
        Ok(())
    }

    /// Whether a root post from `app` may be offered at all.
    pub fn accepts_app(&self, app: &str) -> bool {
        !self
            .excluded_apps
            .iter()
            .any(|prefix| app.starts_with(prefix.as_str()))
    }

    /// Whether `account` would spend spare capacity on this post: the author
    /// is followed or a tag is a subscribed community, and the author is not
    /// on the account's own blacklist.
    pub fn opportunistic_match(&self, account: &str, author: &str, tags: &[String]) -> bool {
        let Some(interests) = self.interests.get(account) else {
            return false;
        };
        if interests.blacklist.contains(author) {
            return false;
        }
        interests.following.contains(author)
            || tags.iter().any(|t| interests.subscriptions.contains(t))
    }

    pub fn tribe(&self) -> &str {
        &self.tribe
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}
