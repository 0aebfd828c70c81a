//! Text and shape of the bot's replies.

use serde_json::json;

use silentbot_chain::CommentOperation;
use silentbot_core::ContentRef;

pub const RESPONSE_TITLE: &str = "silentbot curation comment";

pub fn not_a_curator() -> String {
    "I'm terribly sorry, but I don't recognize you as a curator for this bot.".to_string()
}

pub fn blacklisted(author: &str) -> String {
    format!(
        "I'm really sorry for the inconvenience, but one of our curators has blacklisted @{}.",
        author
    )
}

pub fn not_a_tribe_post(tribe: &str) -> String {
    format!(
        "My apologies for the inconvenience, but this is not a post in the {} tribe.",
        tribe
    )
}

pub fn no_curation_tag(tribe: &str, tags: &[String]) -> String {
    let listed: Vec<String> = tags.iter().map(|t| format!("#{}", t)).collect();
    format!(
        "I'm sorry, curator, but I only curate #{} posts with at least one of these tags: {}",
        tribe,
        listed.join(" ")
    )
}

/// A reply by `bot` to `parent` at the deterministic response permlink.
pub fn build_response(bot: &str, tribe: &str, parent: &ContentRef, body: String) -> CommentOperation {
    CommentOperation {
        parent_author: parent.author.clone(),
        parent_permlink: parent.permlink.clone(),
        author: bot.to_string(),
        permlink: parent.response_permlink(bot),
        title: RESPONSE_TITLE.to_string(),
        body,
        json_metadata: json!({
            "tags": [tribe, bot, "curation"],
            "app": format!("silentbot/{}", env!("CARGO_PKG_VERSION")),
        })
        .to_string(),
    }
}
